//! Frame sink abstraction.
//!
//! The frame sink is the host surface that shows decoded video (a layer, a
//! texture, a widget). It is owned by the host; the controller only tells it
//! which media handle to present and how to scale it.

use crate::playback::MediaHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How decoded frames are scaled into the sink's bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillMode {
    /// Preserve aspect ratio and fit inside the bounds.
    #[default]
    ResizeAspect,
    /// Preserve aspect ratio and fill the bounds, cropping if needed.
    ResizeAspectFill,
    /// Stretch to the bounds.
    Resize,
}

impl FillMode {
    /// Host-facing name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            FillMode::ResizeAspect => "resizeAspect",
            FillMode::ResizeAspectFill => "resizeAspectFill",
            FillMode::Resize => "resize",
        }
    }

    /// Parse a host fill-mode string. Unrecognized values fall back to
    /// [`FillMode::ResizeAspect`].
    pub fn from_host_str(value: &str) -> Self {
        match value.trim() {
            "resizeAspectFill" | "AVLayerVideoGravityResizeAspectFill" => {
                FillMode::ResizeAspectFill
            }
            "resize" | "AVLayerVideoGravityResize" => FillMode::Resize,
            _ => FillMode::ResizeAspect,
        }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FillMode {
    fn from(value: &str) -> Self {
        FillMode::from_host_str(value)
    }
}

/// Host surface that renders frames for a media handle.
///
/// Calls are fire-and-forget; implementations must not block.
pub trait FrameSink: Send + Sync {
    /// Present frames produced for `handle`.
    fn attach(&self, handle: MediaHandle);

    /// Stop presenting frames and clear the surface.
    fn detach(&self);

    fn set_fill_mode(&self, mode: FillMode);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_mode_round_trip_names() {
        for mode in [
            FillMode::ResizeAspect,
            FillMode::ResizeAspectFill,
            FillMode::Resize,
        ] {
            assert_eq!(FillMode::from_host_str(mode.as_str()), mode);
        }
    }

    #[test]
    fn test_fill_mode_unknown_falls_back() {
        assert_eq!(FillMode::from("stretchy"), FillMode::ResizeAspect);
        assert_eq!(
            FillMode::from("AVLayerVideoGravityResizeAspectFill"),
            FillMode::ResizeAspectFill
        );
    }
}
