//! Two-slot matrix correlator with adjacency de-duplication.
//!
//! Variant of the pixel correlator that keeps explicit first-decay and
//! second-decay slots per pixel instead of an unbounded chain. A second decay
//! is accepted only when it falls inside the matrix correlation window of the
//! first and cannot be attributed to an implant at one of the 8 neighboring
//! pixels (charge sharing across adjacent strips mimics a decay).

use crate::correlator::{CorrelatorStatistics, EventCorrelator};
use crate::flusher::{ChainReport, ChainSink};
use crate::pixel::{ChainEntry, ImplantRecord};
use stripcorr_core::event::{default_role, RolePolicy};
use stripcorr_core::{
    ClassifiedEvent, Condition, CorrelationConfig, Error, EventRole, EventType, PixelLocation,
    Result,
};

/// Per-pixel state of the matrix correlator.
#[derive(Debug, Clone, Default)]
pub struct MatrixCell {
    /// The arming implant.
    pub implant: ImplantRecord,
    /// True once an implant has been recorded.
    pub has_implant: bool,
    /// First correlated decay.
    pub first: Option<ChainEntry>,
    /// Second correlated decay.
    pub second: Option<ChainEntry>,
    /// Set when a fast decay marked the cell as interesting.
    pub flagged: bool,
}

impl MatrixCell {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn entries(&self) -> Vec<ChainEntry> {
        let mut entries = Vec::with_capacity(3);
        entries.push(ChainEntry {
            energy: self.implant.energy,
            time: self.implant.time,
            dtime: 0,
            generation: 0,
            event_type: self.implant.event_type.unwrap_or(EventType::Unknown),
            beam: self.implant.beam,
            veto_multiplicity: self.implant.veto_multiplicity,
            mwpc_multiplicity: self.implant.mwpc_multiplicity,
        });
        entries.extend(self.first);
        entries.extend(self.second);
        entries
    }

    fn is_interesting(&self) -> bool {
        if !self.has_implant {
            return false;
        }
        self.first.is_some() || self.implant.event_type == Some(EventType::Fission)
    }
}

/// Two-slot per-pixel correlator.
pub struct MatrixCorrelator {
    config: CorrelationConfig,
    cells: Vec<MatrixCell>,
    role_policy: RolePolicy,
    stats: CorrelatorStatistics,
    /// Second decays vetoed by a neighboring implant.
    neighbor_vetoes: usize,
}

impl MatrixCorrelator {
    /// Creates a matrix correlator with a zeroed grid.
    pub fn new(config: CorrelationConfig) -> Result<Self> {
        config.validate()?;
        let cells = vec![MatrixCell::default(); config.pixel_count()];
        Ok(Self {
            config,
            cells,
            role_policy: default_role,
            stats: CorrelatorStatistics::default(),
            neighbor_vetoes: 0,
        })
    }

    /// Overrides the implant/decay role policy.
    #[must_use]
    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }

    /// Accumulated diagnostic counters.
    pub fn statistics(&self) -> CorrelatorStatistics {
        self.stats
    }

    /// Second decays rejected by the adjacency check.
    pub fn neighbor_vetoes(&self) -> usize {
        self.neighbor_vetoes
    }

    /// Borrows the cell at a location.
    pub fn cell(&self, location: PixelLocation) -> Result<&MatrixCell> {
        self.index(location).map(|idx| &self.cells[idx])
    }

    fn index(&self, location: PixelLocation) -> Result<usize> {
        if location.front >= self.config.front_strips || location.back >= self.config.back_strips {
            return Err(Error::InvalidLocation {
                front: location.front,
                back: location.back,
            });
        }
        Ok(location.front as usize * self.config.back_strips as usize + location.back as usize)
    }

    /// True when an adjacent pixel's implant can account for this decay.
    fn attributable_to_neighbor(&self, location: PixelLocation, time: u64) -> bool {
        location
            .neighbors(self.config.front_strips, self.config.back_strips)
            .filter_map(|n| self.cell(n).ok())
            .any(|cell| {
                cell.has_implant
                    && cell.implant.time.abs_diff(time) < self.config.neighbor_veto_window
            })
    }

    fn on_implant(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition> {
        let idx = self.index(location)?;
        let armed = self.cells[idx].has_implant;

        if armed {
            let dtime = event.time.saturating_sub(self.cells[idx].implant.time);
            if self.cells[idx].flagged {
                sink.emit(ChainReport {
                    location,
                    entries: self.cells[idx].entries(),
                });
                self.stats.chains_emitted += 1;
            } else if self.cells[idx].first.is_some() {
                self.stats.chains_discarded += 1;
            }
            let cell = &mut self.cells[idx];
            cell.reset();
            Self::arm(cell, event, dtime);
            Ok(Condition::BackToBackImplant)
        } else {
            Self::arm(&mut self.cells[idx], event, 0);
            Ok(Condition::ValidImplant)
        }
    }

    fn arm(cell: &mut MatrixCell, event: &ClassifiedEvent, dtime: u64) {
        cell.implant = ImplantRecord {
            energy: event.energy,
            time: event.time,
            dtime,
            event_type: Some(event.event_type),
            beam: event.beam,
            veto_multiplicity: event.veto_multiplicity,
            mwpc_multiplicity: event.mwpc_multiplicity,
        };
        cell.has_implant = true;
        cell.first = None;
        cell.second = None;
        cell.flagged = false;
    }

    fn on_decay(
        &mut self,
        location: PixelLocation,
        event: &ClassifiedEvent,
        sink: &mut dyn ChainSink,
    ) -> Result<Condition> {
        let now = event.time;
        let idx = self.index(location)?;

        if !self.cells[idx].has_implant {
            return Ok(Condition::Unknown);
        }
        let implant_time = self.cells[idx].implant.time;

        if implant_time > now
            && implant_time - now > self.config.clock_reset_margin
            && now < self.config.clock_reset_low_time
        {
            self.global_clock_reset(now, sink);
            return Ok(Condition::Unknown);
        }

        let dt = now.saturating_sub(implant_time);

        if dt < self.config.min_implant_separation {
            return Ok(Condition::ImplantTooSoon);
        }

        if dt > self.config.max_correlation_time {
            if self.cells[idx].first.is_some() {
                self.stats.chains_discarded += 1;
            }
            self.cells[idx].reset();
            return Ok(Condition::DecayTooLate);
        }

        match (self.cells[idx].first, self.cells[idx].second) {
            (None, _) => {
                let entry = ChainEntry::from_event(event, dt, 1);
                let cell = &mut self.cells[idx];
                cell.first = Some(entry);
                if dt < self.config.fast_decay_time {
                    cell.flagged = true;
                }
                Ok(Condition::ValidDecay)
            }
            (Some(first), None) => {
                let since_first = now.saturating_sub(first.time);
                if since_first >= self.config.matrix_window {
                    return Ok(Condition::Unknown);
                }
                if self.attributable_to_neighbor(location, now) {
                    self.neighbor_vetoes += 1;
                    return Ok(Condition::Unknown);
                }
                let entry = ChainEntry::from_event(event, dt, 2);
                let cell = &mut self.cells[idx];
                cell.second = Some(entry);
                if since_first < self.config.fast_decay_time {
                    cell.flagged = true;
                }
                Ok(Condition::ValidDecay)
            }
            (Some(_), Some(_)) => {
                // Both slots full: the chain is complete. Emit it, clear the
                // cell, and discard the extra decay.
                sink.emit(ChainReport {
                    location,
                    entries: self.cells[idx].entries(),
                });
                self.stats.chains_emitted += 1;
                self.cells[idx].reset();
                Ok(Condition::Unknown)
            }
        }
    }

    fn global_clock_reset(&mut self, now: u64, sink: &mut dyn ChainSink) {
        self.stats.clock_resets += 1;
        let back = self.config.back_strips as usize;
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            if cell.has_implant && cell.implant.time > now {
                if cell.is_interesting() {
                    sink.emit(ChainReport {
                        location: PixelLocation::new((idx / back) as u16, (idx % back) as u16),
                        entries: cell.entries(),
                    });
                    self.stats.chains_emitted += 1;
                } else if cell.first.is_some() {
                    self.stats.chains_discarded += 1;
                }
                cell.reset();
            }
        }
    }
}

impl EventCorrelator for MatrixCorrelator {
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
        let idx = self.index(location)?;
        let cell = &self.cells[idx];
        if cell.is_interesting() {
            sink.emit(ChainReport {
                location,
                entries: cell.entries(),
            });
            self.stats.chains_emitted += 1;
            self.cells[idx].reset();
            Ok(true)
        } else {
            let cell = &mut self.cells[idx];
            cell.first = None;
            cell.second = None;
            cell.flagged = false;
            Ok(false)
        }
    }

    fn flush_all(&mut self, sink: &mut dyn ChainSink) -> usize {
        let mut emitted = 0;
        for f in 0..self.config.front_strips {
            for b in 0..self.config.back_strips {
                if let Ok(true) = self.flush(PixelLocation::new(f, b), sink) {
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
        let mut config = CorrelationConfig::new()
            .with_strips(8, 8)
            .with_min_implant_separation(100)
            .with_max_correlation_time(100_000)
            .with_fast_decay_time(500);
        config.matrix_window = 10_000;
        config.neighbor_veto_window = 50;
        config
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

    fn alpha(time: u64) -> ClassifiedEvent {
        ClassifiedEvent {
            energy: 6_000.0,
            back_energy: 5_990.0,
            time,
            event_type: EventType::Alpha,
            beam: false,
            mwpc_multiplicity: 0,
            veto_multiplicity: 0,
        }
    }

    #[test]
    fn test_two_slot_fill() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(3_000), &mut sink).unwrap();

        let cell = correlator.cell(loc).unwrap();
        assert!(cell.first.is_some());
        assert!(cell.second.is_some());
        assert_eq!(cell.first.unwrap().generation, 1);
        assert_eq!(cell.second.unwrap().generation, 2);
    }

    #[test]
    fn test_second_decay_outside_matrix_window() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        let c = correlator.on_event(loc, &alpha(90_000), &mut sink).unwrap();

        assert_eq!(c, Condition::Unknown);
        assert!(correlator.cell(loc).unwrap().second.is_none());
    }

    #[test]
    fn test_neighbor_implant_vetoes_second_decay() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);
        let neighbor = PixelLocation::new(4, 4);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        // Implant lands diagonally adjacent at t=2_990.
        correlator.on_event(neighbor, &implant(2_990), &mut sink).unwrap();

        // Candidate second decay at t=3_000 is within 50 ticks of the
        // neighbor implant: attributed to charge sharing, vetoed.
        let c = correlator.on_event(loc, &alpha(3_000), &mut sink).unwrap();
        assert_eq!(c, Condition::Unknown);
        assert!(correlator.cell(loc).unwrap().second.is_none());
        assert_eq!(correlator.neighbor_vetoes(), 1);
    }

    #[test]
    fn test_distant_implant_does_not_veto() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);
        let far = PixelLocation::new(6, 6);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        correlator.on_event(far, &implant(2_990), &mut sink).unwrap();

        let c = correlator.on_event(loc, &alpha(3_000), &mut sink).unwrap();
        assert_eq!(c, Condition::ValidDecay);
        assert!(correlator.cell(loc).unwrap().second.is_some());
    }

    #[test]
    fn test_overflow_emits_and_resets() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(3, 3);

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(3_000), &mut sink).unwrap();
        let c = correlator.on_event(loc, &alpha(4_000), &mut sink).unwrap();

        assert_eq!(c, Condition::Unknown);
        assert_eq!(sink.reports.len(), 1);
        assert_eq!(sink.reports[0].entries.len(), 3);
        assert!(!correlator.cell(loc).unwrap().has_implant);
    }

    #[test]
    fn test_flush_idempotent() {
        let mut correlator = MatrixCorrelator::new(config()).unwrap();
        let mut sink = VecSink::new();
        let loc = PixelLocation::new(2, 2);

        assert!(!correlator.flush(loc, &mut sink).unwrap());
        assert!(!correlator.flush(loc, &mut sink).unwrap());

        correlator.on_event(loc, &implant(1_000), &mut sink).unwrap();
        correlator.on_event(loc, &alpha(2_000), &mut sink).unwrap();
        assert!(correlator.flush(loc, &mut sink).unwrap());
        assert!(!correlator.flush(loc, &mut sink).unwrap());
        assert_eq!(sink.reports.len(), 1);
    }
}
