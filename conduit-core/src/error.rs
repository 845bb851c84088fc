//! Error types.
//!
//! The primitive itself has no I/O and almost no failure modes. Misuse is
//! reported through `tracing` warnings; the variants here cover the async
//! bridge and configuration loading.

use thiserror::Error;

/// Errors surfaced by the crate.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// The source cell completed before it produced a value.
    #[error("source completed before emitting a value")]
    Completed,

    /// A [`FirstValue`](crate::reactive::FirstValue) was polled after it resolved.
    #[error("first value was already taken")]
    AlreadyResolved,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConduitError>;
