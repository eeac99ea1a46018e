//! stripcorr-core: Core types for strip-detector decay-chain correlation.
//!
//! This crate provides the shared data model for front/back strip matching,
//! event classification, and per-pixel implant/decay bookkeeping.

pub mod condition;
pub mod config;
pub mod error;
pub mod event;
pub mod hit;

pub use condition::Condition;
pub use config::{ClassifierCutoffs, CorrelationConfig};
pub use error::{Error, Result};
pub use event::{ClassifiedEvent, EventRole, EventType, MatchedPair, RolePolicy};
pub use hit::{PixelLocation, StripHit, SubPulse};
