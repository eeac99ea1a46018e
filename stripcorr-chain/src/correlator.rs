//! Per-pixel implant/decay correlation state machine.

use crate::flusher::{build_report, chain_is_interesting, ChainSink};
use crate::pixel::{ChainEntry, PixelGrid};
use stripcorr_core::event::{default_role, RolePolicy};
use stripcorr_core::{
    ClassifiedEvent, Condition, CorrelationConfig, Error, EventRole, EventType, PixelLocation,
    Result,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Diagnostic counters accumulated by a correlator.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelatorStatistics {
    /// Implants accepted at empty pixels.
    pub valid_implants: usize,
    /// Decays appended to chains.
    pub valid_decays: usize,
    /// Implants that arrived while the pixel was already armed.
    pub back_to_back_implants: usize,
    /// Decays discarded inside the post-implant dead time.
    pub implants_too_soon: usize,
    /// Decays beyond the correlation window (chain severed).
    pub decays_too_late: usize,
    /// Orphan decays, reset triggers, and other uncorrelatable events.
    pub unknown: usize,
    /// Events at locations outside the grid.
    pub invalid_locations: usize,
    /// Global hardware clock resets detected.
    pub clock_resets: usize,
    /// Interesting chains handed to the sink.
    pub chains_emitted: usize,
    /// Chains cleared without emission.
    pub chains_discarded: usize,
}

impl CorrelatorStatistics {
    pub(crate) fn record(&mut self, condition: Condition) {
        match condition {
            Condition::ValidImplant => self.valid_implants += 1,
            Condition::ValidDecay => self.valid_decays += 1,
            Condition::BackToBackImplant => self.back_to_back_implants += 1,
            Condition::DecayTooLate => self.decays_too_late += 1,
            Condition::ImplantTooSoon => self.implants_too_soon += 1,
            Condition::InvalidLocation => self.invalid_locations += 1,
            Condition::Unknown => self.unknown += 1,
        }
    }
}

/// Common surface of the correlator variants.
pub trait EventCorrelator {
    /// Routes one classified event into its pixel cell.
    fn on_event(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition>;

    /// Emits the chain at a location if interesting; always clears it.
    fn flush(&mut self, location: PixelLocation, sink: &mut dyn ChainSink) -> Result<bool>;

    /// End-of-run drain over the whole grid; returns chains emitted.
    fn flush_all(&mut self, sink: &mut dyn ChainSink) -> usize;
}

/// Per-pixel decay-chain correlator over a fixed strip grid.
///
/// One instance per analysis run. The grid is the only long-lived mutable
/// state and is mutated exclusively by the calling thread; callers sharing a
/// correlator across threads must provide external mutual exclusion.
pub struct PixelCorrelator {
    config: CorrelationConfig,
    grid: PixelGrid,
    role_policy: RolePolicy,
    stats: CorrelatorStatistics,
}

impl PixelCorrelator {
    /// Creates a correlator with a zeroed grid.
    pub fn new(config: CorrelationConfig) -> Result<Self> {
        config.validate()?;
        let grid = PixelGrid::new(config.front_strips, config.back_strips);
        Ok(Self {
            config,
            grid,
            role_policy: default_role,
            stats: CorrelatorStatistics::default(),
        })
    }

    /// Overrides the implant/decay role policy.
    #[must_use]
    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Read access to the pixel grid.
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Accumulated diagnostic counters.
    pub fn statistics(&self) -> CorrelatorStatistics {
        self.stats
    }

    fn on_implant(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition> {
        let cell = self.grid.cell_mut(location)?;

        if cell.has_implant {
            let dtime = event.time.saturating_sub(cell.implant.time);
            if cell.flagged {
                sink.emit(build_report(location, cell));
                self.stats.chains_emitted += 1;
            } else if !cell.chain.is_empty() {
                self.stats.chains_discarded += 1;
            }
            cell.accept_implant(event, dtime);
            Ok(Condition::BackToBackImplant)
        } else {
            cell.accept_implant(event, 0);
            Ok(Condition::ValidImplant)
        }
    }

    fn on_decay(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition> {
        let now = event.time;
        let (has_implant, implant_time) = {
            let cell = self.grid.cell(location)?;
            (cell.has_implant, cell.implant.time)
        };

        if !has_implant {
            // Orphan decay; nothing to correlate it against.
            return Ok(Condition::Unknown);
        }

        if implant_time > now
            && implant_time - now > self.config.clock_reset_margin
            && now < self.config.clock_reset_low_time
        {
            self.global_clock_reset(now, sink);
            return Ok(Condition::Unknown);
        }

        // Small backwards jitter lands in the dead-time branch below.
        let dt = now.saturating_sub(implant_time);

        if dt < self.config.min_implant_separation {
            return Ok(Condition::ImplantTooSoon);
        }

        if dt > self.config.max_correlation_time {
            let cell = self.grid.cell_mut(location)?;
            if !cell.chain.is_empty() {
                self.stats.chains_discarded += 1;
            }
            cell.reset();
            return Ok(Condition::DecayTooLate);
        }

        let fast_decay_time = self.config.fast_decay_time;
        let cell = self.grid.cell_mut(location)?;
        let gap = now.saturating_sub(cell.last_time());
        let entry = ChainEntry::from_event(event, dt, cell.next_generation());
        cell.chain.push(entry);
        if gap < fast_decay_time {
            cell.flagged = true;
        }
        Ok(Condition::ValidDecay)
    }

    /// Global hardware clock reset recovery.
    ///
    /// Every armed cell whose implant predates the reset (timestamp larger
    /// than the post-reset `now`) is flushed and cleared. The triggering
    /// decay itself is discarded by the caller.
    fn global_clock_reset(&mut self, now: u64, sink: &mut dyn ChainSink) {
        self.stats.clock_resets += 1;
        for (location, cell) in self.grid.iter_mut() {
            if cell.has_implant && cell.implant.time > now {
                if chain_is_interesting(cell) {
                    sink.emit(build_report(location, cell));
                    self.stats.chains_emitted += 1;
                } else if !cell.chain.is_empty() {
                    self.stats.chains_discarded += 1;
                }
                cell.reset();
            }
        }
    }
}

impl EventCorrelator for PixelCorrelator {
    fn on_event(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition> {
        let result = match (self.role_policy)(event.event_type) {
            EventRole::Implant => self.on_implant(location, event, sink),
            EventRole::Decay => self.on_decay(location, event, sink),
        };
        match &result {
            Ok(condition) => self.stats.record(*condition),
            Err(Error::InvalidLocation { .. }) => self.stats.invalid_locations += 1,
            Err(_) => {}
        }
        result
    }

    fn flush(&mut self, location: PixelLocation, sink: &mut dyn ChainSink) -> Result<bool> {
        let cell = self.grid.cell_mut(location)?;
        if chain_is_interesting(cell) {
            let terminal_fission = cell
                .chain
                .last()
                .map_or(cell.implant.event_type == Some(EventType::Fission), |e| {
                    e.event_type == EventType::Fission
                });
            sink.emit(build_report(location, cell));
            self.stats.chains_emitted += 1;
            if terminal_fission {
                // A fission ends the chain; nothing further can correlate.
                cell.reset();
            } else {
                cell.clear_chain();
            }
            Ok(true)
        } else {
            cell.clear_chain();
            Ok(false)
        }
    }

    fn flush_all(&mut self, sink: &mut dyn ChainSink) -> usize {
        let (front, back) = self.grid.extents();
        let mut emitted = 0;
        for f in 0..front {
            for b in 0..back {
                let location = PixelLocation::new(f, b);
                // In-bounds by construction.
                if let Ok(true) = self.flush(location, sink) {
                    emitted += 1;
                }
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher::VecSink;

    fn config() -> CorrelationConfig {
        CorrelationConfig::new()
            .with_strips(8, 8)
            .with_min_implant_separation(100)
            .with_max_correlation_time(5_000)
            .with_fast_decay_time(500)
    }

    fn implant(time: u64) -> ClassifiedEvent {
        ClassifiedEvent {
            energy: 9_000.0,
            back_energy: 8_990.0,
            time,
            event_type: EventType::HeavyIon,
            beam: true,
            mwpc_multiplicity: 1,
            veto_multiplicity: 0,
        }
    }

    fn decay(time: u64, event_type: EventType) -> ClassifiedEvent {
        ClassifiedEvent {
            energy: 6_000.0,
            back_energy: 5_990.0,
            time,
            event_type,
            beam: false,
            mwpc_multiplicity: 0,
            veto_multiplicity: 0,
        }
    }

    #[test]
    fn test_implant_then_valid_decay() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(2, 3);

        let c = correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        assert_eq!(c, Condition::ValidImplant);

        let c = correlator
            .on_event(loc, &decay(2_000, EventType::Alpha), &mut sink)
            .unwrap();
        assert_eq!(c, Condition::ValidDecay);

        let cell = correlator.grid().cell(loc).unwrap();
        assert_eq!(cell.chain.len(), 1);
        assert_eq!(cell.chain[0].generation, 1);
        assert_eq!(cell.chain[0].dtime, 1_000);
    }

    #[test]
    fn test_implant_too_soon() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(0, 0);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        let c = correlator
            .on_event(loc, &decay(1_099, EventType::Alpha), &mut sink)
            .unwrap();
        assert_eq!(c, Condition::ImplantTooSoon);
        assert!(correlator.grid().cell(loc).unwrap().chain.is_empty());
    }

    #[test]
    fn test_decay_too_late_severs_chain() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(0, 0);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        let c = correlator
            .on_event(loc, &decay(1_000 + 5_001, EventType::Alpha), &mut sink)
            .unwrap();
        assert_eq!(c, Condition::DecayTooLate);
        assert!(sink.reports.is_empty());
        assert!(!correlator.grid().cell(loc).unwrap().has_implant);
    }

    #[test]
    fn test_back_to_back_implant_clears_chain() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(1, 1);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator
            .on_event(loc, &decay(2_000, EventType::Alpha), &mut sink)
            .unwrap();
        let c = correlator.on_event(loc, &implant(3_000), &mut sink).unwrap();
        assert_eq!(c, Condition::BackToBackImplant);

        let cell = correlator.grid().cell(loc).unwrap();
        assert!(cell.chain.is_empty());
        assert_eq!(cell.implant.time, 3_000);
        assert_eq!(cell.implant.dtime, 2_000);
    }

    #[test]
    fn test_back_to_back_emits_flagged_chain() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(1, 1);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        // Gap 300 < fast_decay_time 500 flags the chain.
        correlator
            .on_event(loc, &decay(1_300, EventType::Alpha), &mut sink)
            .unwrap();
        correlator.on_event(loc, &implant(10_000), &mut sink).unwrap();

        assert_eq!(sink.reports.len(), 1);
        assert_eq!(sink.reports[0].entries.len(), 2);
    }

    #[test]
    fn test_orphan_decay_unknown() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let c = correlator
            .on_event(PixelLocation::new(0, 0), &decay(500, EventType::Alpha), &mut sink)
            .unwrap();
        assert_eq!(c, Condition::Unknown);
    }

    #[test]
    fn test_invalid_location_is_error() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let err = correlator
            .on_event(PixelLocation::new(64, 0), &implant(1_000), &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLocation { front: 64, back: 0 }));
        assert_eq!(correlator.statistics().invalid_locations, 1);
    }

    #[test]
    fn test_global_clock_reset() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc_a = PixelLocation::new(0, 0);
        let loc_b = PixelLocation::new(4, 4);

        correlator
            .on_event(loc_a, &implant(1_000_000_000_000), &mut sink)
            .unwrap();
        correlator
            .on_event(loc_b, &implant(1_000_000_000_500), &mut sink)
            .unwrap();

        // Decay at t=5 against an implant at 1e12: hardware clock reset.
        let c = correlator
            .on_event(loc_a, &decay(5, EventType::Alpha), &mut sink)
            .unwrap();
        assert_eq!(c, Condition::Unknown);
        assert_eq!(correlator.statistics().clock_resets, 1);

        // Every armed cell was cleared; the triggering decay was discarded.
        assert!(!correlator.grid().cell(loc_a).unwrap().has_implant);
        assert!(!correlator.grid().cell(loc_b).unwrap().has_implant);
        assert!(correlator.grid().cell(loc_a).unwrap().chain.is_empty());
    }

    #[test]
    fn test_flush_idempotent_on_empty() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        assert!(!correlator.flush(loc, &mut sink).unwrap());
        assert!(!correlator.flush(loc, &mut sink).unwrap());
        assert!(sink.reports.is_empty());
    }

    #[test]
    fn test_flush_emits_then_keeps_armed() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator
            .on_event(loc, &decay(2_000, EventType::Alpha), &mut sink)
            .unwrap();

        assert!(correlator.flush(loc, &mut sink).unwrap());
        assert_eq!(sink.reports.len(), 1);

        // Partial drain: implant stays armed, repeated flush is a no-op.
        let cell = correlator.grid().cell(loc).unwrap();
        assert!(cell.has_implant);
        assert!(cell.chain.is_empty());
        assert!(!correlator.flush(loc, &mut sink).unwrap());
        assert_eq!(sink.reports.len(), 1);
    }

    #[test]
    fn test_flush_terminal_fission_resets_cell() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator
            .on_event(loc, &decay(2_000, EventType::Fission), &mut sink)
            .unwrap();

        assert!(correlator.flush(loc, &mut sink).unwrap());
        assert!(!correlator.grid().cell(loc).unwrap().has_implant);
        assert!(!correlator.flush(loc, &mut sink).unwrap());
    }

    #[test]
    fn test_chain_causality_by_construction() {
        let mut correlator = PixelCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(5, 5);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        for t in [1_050, 1_150, 2_500, 4_000] {
            let _ = correlator.on_event(loc, &decay(t, EventType::Alpha), &mut sink);
        }

        let cell = correlator.grid().cell(loc).unwrap();
        assert!(cell
            .chain
            .iter()
            .all(|e| e.dtime >= correlator.config().min_implant_separation));
    }
}
