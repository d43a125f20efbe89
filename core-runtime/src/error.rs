//! Errors raised while assembling a player's runtime.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rejected player or logging configuration: zero-sized channel
    /// buffers, an over-long retry delay, unparsable log directives.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A collaborator the controller cannot run without is absent. Raised
    /// for a missing `MediaSource` at build time and for construction
    /// outside a tokio runtime.
    #[error("{capability} unavailable: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Player runtime failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
