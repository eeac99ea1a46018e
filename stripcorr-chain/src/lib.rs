//! stripcorr-chain: Event classification and per-pixel decay-chain correlation.
//!
//! This crate turns matched front/back pairs into classified physics events
//! and maintains the per-pixel implant/decay state machine:
//!
//! - [`classify`] - fixed condition-code lookup table
//! - [`PixelCorrelator`] - one state cell per (front, back) location
//! - [`MatrixCorrelator`] - two-slot variant with adjacency de-duplication
//! - [`ChainSink`] / [`ChainReport`] - emission seam for interesting chains
#![warn(missing_docs)]

mod classify;
mod correlator;
mod flusher;
mod matrix;
mod pixel;
mod processing;

pub use classify::classify;
pub use correlator::{CorrelatorStatistics, EventCorrelator, PixelCorrelator};
pub use flusher::{chain_is_interesting, ChainReport, ChainSink, VecSink};
pub use matrix::{MatrixCell, MatrixCorrelator};
pub use pixel::{ChainEntry, ImplantRecord, PixelCell, PixelGrid};
pub use processing::{process_frame, FrameSummary};

// Re-export core types for convenience
pub use stripcorr_core::{
    ClassifiedEvent, ClassifierCutoffs, Condition, CorrelationConfig, EventRole, EventType,
};
