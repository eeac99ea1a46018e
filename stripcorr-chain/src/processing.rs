//! High-level helper that runs one frame through match → classify → correlate.

use crate::classify::classify;
use crate::correlator::EventCorrelator;
use crate::flusher::ChainSink;
use stripcorr_core::{ClassifiedEvent, ClassifierCutoffs, Condition};
use stripcorr_dssd::{Frame, StripMatcher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-frame accounting produced by [`process_frame`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameSummary {
    /// Front/back pairs matched.
    pub pairs: usize,
    /// Front hits left unmatched.
    pub unmatched_front: usize,
    /// Back hits left unmatched.
    pub unmatched_back: usize,
    /// Hits excluded as invalid before matching.
    pub invalid_hits: usize,
    /// Condition code per matched pair, in pair order; out-of-grid pairs
    /// read as [`Condition::InvalidLocation`].
    pub conditions: Vec<Condition>,
    /// Events rejected for an out-of-grid location.
    pub invalid_locations: usize,
}

/// Processes one acquisition frame to completion.
///
/// Matching, classification, and correlation are best-effort per hit: an
/// invalid location from one event is counted and the remaining pairs of the
/// frame still run.
pub fn process_frame<C: EventCorrelator>(
    matcher: &mut StripMatcher,
    cutoffs: &ClassifierCutoffs,
    correlator: &mut C,
    frame: &Frame,
    sink: &mut dyn ChainSink,
) -> FrameSummary {
    let matched = matcher.match_frame(&frame.front, &frame.back);

    let mut summary = FrameSummary {
        pairs: matched.pairs.len(),
        unmatched_front: matched.unmatched_front.len(),
        unmatched_back: matched.unmatched_back.len(),
        invalid_hits: matched.invalid.len(),
        ..FrameSummary::default()
    };

    for pair in &matched.pairs {
        let event_type = classify(
            pair.front.energy,
            frame.beam,
            frame.mwpc_multiplicity,
            frame.veto_multiplicity > 0,
            cutoffs,
        );
        let event = ClassifiedEvent {
            energy: pair.front.energy,
            back_energy: pair.back.energy,
            time: pair.time,
            event_type,
            beam: frame.beam,
            mwpc_multiplicity: frame.mwpc_multiplicity,
            veto_multiplicity: frame.veto_multiplicity,
        };
        match correlator.on_event(pair.location(), &event, sink) {
            Ok(condition) => summary.conditions.push(condition),
            Err(_) => {
                summary.conditions.push(Condition::InvalidLocation);
                summary.invalid_locations += 1;
            }
        }
    }

    summary
}
