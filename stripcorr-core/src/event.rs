//! Matched-pair and classified-event types.

use crate::hit::StripHit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discrete physics event type produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventType {
    /// Heavy recoil ion stopping in the detector.
    HeavyIon,
    /// Alpha decay.
    Alpha,
    /// Spontaneous-fission-like high-energy decay.
    Fission,
    /// Light charged particle punching through.
    LightIon,
    /// Unclassifiable signal.
    Unknown,
}

impl EventType {
    /// One-character tag used in chain report lines.
    #[inline]
    pub fn tag(&self) -> char {
        match self {
            Self::HeavyIon => 'I',
            Self::Alpha => 'A',
            Self::Fission => 'F',
            Self::LightIon => 'L',
            Self::Unknown => 'U',
        }
    }
}

/// Whether an event starts a correlation window or extends one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRole {
    /// Starts a new correlation window at its pixel.
    Implant,
    /// Correlated against the standing implant at its pixel.
    Decay,
}

/// Caller-supplied policy mapping event types to implant/decay roles.
pub type RolePolicy = fn(EventType) -> EventRole;

/// Default role policy: heavy ions implant, everything else decays.
///
/// Fission stays decay-class so a fission can terminate a chain instead of
/// restarting the pixel.
#[inline]
pub fn default_role(event_type: EventType) -> EventRole {
    match event_type {
        EventType::HeavyIon => EventRole::Implant,
        EventType::Alpha | EventType::Fission | EventType::LightIon | EventType::Unknown => {
            EventRole::Decay
        }
    }
}

/// One front hit bound to one back hit within a single acquisition frame.
///
/// Created fresh per processing cycle by the matcher and consumed within the
/// same cycle; never retained across frames.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchedPair {
    /// Front-side hit.
    pub front: StripHit,
    /// Back-side hit.
    pub back: StripHit,
    /// Pair timestamp, the earlier of the two sides.
    pub time: u64,
}

impl MatchedPair {
    /// Binds a front and a back hit; pair time is the earlier of the two.
    pub fn new(front: StripHit, back: StripHit) -> Self {
        let time = front.time.min(back.time);
        Self { front, back, time }
    }

    /// Pixel location keyed by the two strip indices.
    #[inline]
    pub fn location(&self) -> crate::hit::PixelLocation {
        crate::hit::PixelLocation::new(self.front.strip, self.back.strip)
    }
}

/// A matched pair after classification, ready for pixel correlation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassifiedEvent {
    /// Front-side calibrated energy (the classification energy).
    pub energy: f64,
    /// Back-side calibrated energy, kept for reporting.
    pub back_energy: f64,
    /// Event timestamp (pair time).
    pub time: u64,
    /// Classifier output.
    pub event_type: EventType,
    /// Beam-on flag for the frame.
    pub beam: bool,
    /// Beam-monitor (MWPC) multiplicity for the frame.
    pub mwpc_multiplicity: u32,
    /// Veto-detector multiplicity for the frame.
    pub veto_multiplicity: u32,
}

impl ClassifiedEvent {
    /// True when the veto detector fired in this frame.
    #[inline]
    pub fn veto(&self) -> bool {
        self.veto_multiplicity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_time_is_min() {
        let front = StripHit::new(500.0, 103, 4);
        let back = StripHit::new(505.0, 100, 7);
        let pair = MatchedPair::new(front, back);
        assert_eq!(pair.time, 100);
        assert_eq!(pair.location(), crate::hit::PixelLocation::new(4, 7));
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(EventType::HeavyIon.tag(), 'I');
        assert_eq!(EventType::Alpha.tag(), 'A');
        assert_eq!(EventType::Fission.tag(), 'F');
        assert_eq!(EventType::LightIon.tag(), 'L');
        assert_eq!(EventType::Unknown.tag(), 'U');
    }

    #[test]
    fn test_default_role() {
        assert_eq!(default_role(EventType::HeavyIon), EventRole::Implant);
        assert_eq!(default_role(EventType::Alpha), EventRole::Decay);
        assert_eq!(default_role(EventType::Fission), EventRole::Decay);
        assert_eq!(default_role(EventType::LightIon), EventRole::Decay);
        assert_eq!(default_role(EventType::Unknown), EventRole::Decay);
    }
}
