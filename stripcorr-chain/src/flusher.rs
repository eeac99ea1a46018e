//! Chain emission policy and report rendering.

use crate::pixel::{ChainEntry, PixelCell};
use stripcorr_core::{EventType, PixelLocation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An emitted decay chain: the implant plus its accumulated decays.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainReport {
    /// Pixel the chain was accumulated at.
    pub location: PixelLocation,
    /// Implant (generation 0) followed by the decays in arrival order.
    pub entries: Vec<ChainEntry>,
}

impl ChainReport {
    /// Renders one human-readable line per entry for a reporting sink.
    ///
    /// Format: type tag, energy, time since implant, auxiliary flags.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "{} {:.1} {} beam={} veto={} mwpc={}",
                    entry.event_type.tag(),
                    entry.energy,
                    entry.dtime,
                    u8::from(entry.beam),
                    entry.veto_multiplicity,
                    entry.mwpc_multiplicity,
                )
            })
            .collect()
    }
}

/// Destination for emitted chains.
pub trait ChainSink {
    /// Receives one emitted chain.
    fn emit(&mut self, report: ChainReport);
}

/// Sink that collects reports in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    /// Collected reports, in emission order.
    pub reports: Vec<ChainReport>,
}

impl VecSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the collected reports.
    pub fn take(&mut self) -> Vec<ChainReport> {
        std::mem::take(&mut self.reports)
    }
}

impl ChainSink for VecSink {
    fn emit(&mut self, report: ChainReport) {
        self.reports.push(report);
    }
}

/// Decides whether a pixel's accumulated chain is worth emitting.
///
/// A chain is interesting iff it starts with an implant and either has at
/// least two total entries or its terminal entry is fission-class.
pub fn chain_is_interesting(cell: &PixelCell) -> bool {
    if !cell.has_implant {
        return false;
    }
    if !cell.chain.is_empty() {
        return true;
    }
    // Implant alone: only a fission-class implant terminates interestingly.
    cell.implant.event_type == Some(EventType::Fission)
}

/// Builds the report for a cell: implant entry followed by the chain.
pub(crate) fn build_report(location: PixelLocation, cell: &PixelCell) -> ChainReport {
    let mut entries = Vec::with_capacity(cell.chain.len() + 1);
    entries.push(ChainEntry {
        energy: cell.implant.energy,
        time: cell.implant.time,
        dtime: 0,
        generation: 0,
        event_type: cell.implant.event_type.unwrap_or(EventType::Unknown),
        beam: cell.implant.beam,
        veto_multiplicity: cell.implant.veto_multiplicity,
        mwpc_multiplicity: cell.implant.mwpc_multiplicity,
    });
    entries.extend(cell.chain.iter().copied());
    ChainReport { location, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripcorr_core::ClassifiedEvent;

    fn cell_with(event_type: EventType, decays: usize) -> PixelCell {
        let mut cell = PixelCell::default();
        cell.accept_implant(
            &ClassifiedEvent {
                energy: 9_000.0,
                back_energy: 8_990.0,
                time: 1_000,
                event_type,
                beam: true,
                mwpc_multiplicity: 1,
                veto_multiplicity: 0,
            },
            0,
        );
        for gen in 0..decays {
            cell.chain.push(ChainEntry {
                energy: 6_000.0,
                time: 2_000 + gen as u64,
                dtime: 1_000 + gen as u64,
                generation: gen as u32 + 1,
                event_type: EventType::Alpha,
                beam: false,
                veto_multiplicity: 0,
                mwpc_multiplicity: 0,
            });
        }
        cell
    }

    #[test]
    fn test_empty_cell_not_interesting() {
        assert!(!chain_is_interesting(&PixelCell::default()));
    }

    #[test]
    fn test_lone_heavy_ion_not_interesting() {
        assert!(!chain_is_interesting(&cell_with(EventType::HeavyIon, 0)));
    }

    #[test]
    fn test_implant_plus_decay_interesting() {
        assert!(chain_is_interesting(&cell_with(EventType::HeavyIon, 1)));
    }

    #[test]
    fn test_lone_fission_terminal_interesting() {
        assert!(chain_is_interesting(&cell_with(EventType::Fission, 0)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_report_json_round_trip() {
        let report = build_report(PixelLocation::new(3, 4), &cell_with(EventType::HeavyIon, 1));
        let json = serde_json::to_string(&report).unwrap();
        let back: ChainReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.location, report.location);
        assert_eq!(back.entries.len(), 2);
        assert_eq!(back.entries[1].event_type, EventType::Alpha);
    }

    #[test]
    fn test_report_lines() {
        let cell = cell_with(EventType::HeavyIon, 2);
        let report = build_report(PixelLocation::new(3, 4), &cell);
        let lines = report.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("I 9000.0 0 beam=1"));
        assert!(lines[1].starts_with("A 6000.0 1000"));
        assert_eq!(report.entries[0].generation, 0);
        assert_eq!(report.entries[2].generation, 2);
    }
}
