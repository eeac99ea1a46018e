//! Per-event correlation condition codes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of routing one classified event through the pixel correlator.
///
/// These are diagnostic policy outcomes, not failures; callers typically
/// count them. Out-of-bounds locations abort their event with
/// [`crate::Error::InvalidLocation`]; frame-level accounting maps that error
/// back to [`Condition::InvalidLocation`] alongside the other outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Condition {
    /// Implant accepted at an empty pixel.
    ValidImplant,
    /// Decay appended to the pixel's chain.
    ValidDecay,
    /// Implant arrived while the pixel was already armed.
    BackToBackImplant,
    /// Decay beyond the correlation window; the chain was severed.
    DecayTooLate,
    /// Decay inside the post-implant dead time; discarded.
    ImplantTooSoon,
    /// Location outside the configured grid.
    InvalidLocation,
    /// Orphan decay, clock-reset trigger, or otherwise uncorrelatable.
    Unknown,
}
