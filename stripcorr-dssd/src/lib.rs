//! stripcorr-dssd: Detector-frame handling and front/back strip matching.
//!
//! One acquisition frame yields two unordered hit collections (front side,
//! back side). This crate expands pileup traces into synthetic hits and pairs
//! the two sides by nearest timestamp, greedily in input order.
#![warn(missing_docs)]

mod frame;
mod matcher;
mod pileup;

pub use frame::Frame;
pub use matcher::{MatchResult, MatchStatistics, MatcherConfig, RejectedHit, StripMatcher};
pub use pileup::expand_pileup;

// Re-export core types for convenience
pub use stripcorr_core::{MatchedPair, StripHit};
