//! Error types for stripcorr-core.

use thiserror::Error;

/// Result type alias for stripcorr operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for stripcorr operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Event location outside the configured strip grid.
    #[error("invalid pixel location: ({front}, {back})")]
    InvalidLocation { front: u16, back: u16 },

    /// Hit with an unusable field, excluded from matching.
    #[error("invalid hit: {0}")]
    InvalidHit(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
