//! Acquisition frame type.

use stripcorr_core::StripHit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One acquisition frame: the two strip-side hit collections plus the
/// auxiliary detector flags sampled for the same frame.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    /// Front-side hits, in acquisition order.
    pub front: Vec<StripHit>,
    /// Back-side hits, in acquisition order.
    pub back: Vec<StripHit>,
    /// Beam-on flag.
    #[cfg_attr(feature = "serde", serde(default))]
    pub beam: bool,
    /// Beam-monitor (MWPC) multiplicity.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mwpc_multiplicity: u32,
    /// Veto-detector multiplicity.
    #[cfg_attr(feature = "serde", serde(default))]
    pub veto_multiplicity: u32,
}

impl Frame {
    /// Creates an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total hit count across both sides.
    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    /// True when neither side recorded a hit.
    pub fn is_empty(&self) -> bool {
        self.front.is_empty() && self.back.is_empty()
    }
}
