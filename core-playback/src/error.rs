//! # Playback Error Types
//!
//! Errors surfaced by the playback controller to its host.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
///
/// Most engine failures never reach the host as errors: they are retried
/// silently and, once retries are exhausted, surface as the `Failed` playback
/// state. Out-of-range seeks are clamped rather than rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// A play command was issued before any asset was configured.
    #[error("No asset configured")]
    NoAsset,

    /// The media source failed to load or play the asset.
    #[error("Failed to load asset: {0}")]
    LoadFailure(String),

    /// The controller task has shut down.
    #[error("Player controller is closed")]
    ControllerClosed,

    #[error("Media bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::LoadFailure(_)
                | PlaybackError::Bridge(BridgeError::LoadFailed(_))
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PlaybackError::LoadFailure("stalled".into()).is_transient());
        assert!(PlaybackError::from(BridgeError::LoadFailed("404".into())).is_transient());
        assert!(!PlaybackError::NoAsset.is_transient());
        assert!(!PlaybackError::ControllerClosed.is_transient());
        assert!(!PlaybackError::from(BridgeError::InvalidHandle(4)).is_transient());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(PlaybackError::NoAsset.to_string(), "No asset configured");
        assert_eq!(
            PlaybackError::from(core_runtime::Error::Internal("no runtime".into())).to_string(),
            "Runtime error: Player runtime failure: no runtime"
        );
    }
}
