//! # Player Configuration Module
//!
//! Provides configuration for a playback controller.
//!
//! ## Overview
//!
//! [`PlaybackSettings`] holds the host-tunable playback behavior (looping,
//! freezing at the end, preloading, muting, retry bounds, fill mode). It is
//! serializable so hosts can persist it with their own preferences.
//!
//! [`PlayerConfig`] bundles those settings with the bridges a controller needs
//! and is built through [`PlayerConfigBuilder`], which fails fast when a
//! required bridge is missing.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{PlayerConfig, PlaybackSettings};
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::builder()
//!     .media_source(Arc::new(MyMediaSource::new()))
//!     .frame_sink(Arc::new(MyVideoLayer::new()))
//!     .settings(PlaybackSettings::default().with_loops(true))
//!     .build()
//!     .expect("Failed to build player config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AssetReference, FillMode, FrameSink, MediaSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the controller's command queue.
pub const DEFAULT_COMMAND_BUFFER_SIZE: usize = 32;

/// Upper bound accepted for [`PlaybackSettings::retry_delay`].
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

// ============================================================================
// Playback Settings
// ============================================================================

/// Host-tunable playback behavior.
///
/// Changes take effect on the next operation they influence; they never
/// interrupt playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Restart from the beginning when the end is reached.
    #[serde(default)]
    pub loops: bool,

    /// When not looping, pause on the last frame instead of stopping.
    #[serde(default)]
    pub freeze_at_end: bool,

    /// Defer the transition to playing until the engine reports readiness.
    #[serde(default)]
    pub preload_before_playing: bool,

    #[serde(default)]
    pub muted: bool,

    /// Consecutive reloads allowed after engine failures before giving up.
    /// Zero disables automatic retry.
    ///
    /// Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Forwarded to the frame sink.
    #[serde(default)]
    pub fill_mode: FillMode,

    /// Wait before a granted retry re-issues the load.
    ///
    /// Default: no delay.
    #[serde(default)]
    pub retry_delay: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loops: false,
            freeze_at_end: false,
            preload_before_playing: false,
            muted: false,
            max_retries: default_max_retries(),
            fill_mode: FillMode::default(),
            retry_delay: Duration::ZERO,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

impl PlaybackSettings {
    pub fn with_loops(mut self, loops: bool) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_freeze_at_end(mut self, freeze: bool) -> Self {
        self.freeze_at_end = freeze;
        self
    }

    pub fn with_preload_before_playing(mut self, preload: bool) -> Self {
        self.preload_before_playing = preload;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay > MAX_RETRY_DELAY {
            return Err(Error::Config(format!(
                "retry_delay of {:?} exceeds the maximum of {:?}",
                self.retry_delay, MAX_RETRY_DELAY
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Player Configuration
// ============================================================================

/// Everything a controller needs to start.
#[derive(Clone)]
pub struct PlayerConfig {
    /// Media engine wrapper (required)
    pub media_source: Arc<dyn MediaSource>,

    /// Surface showing decoded frames (optional; headless hosts omit it)
    pub frame_sink: Option<Arc<dyn FrameSink>>,

    /// Initial playback settings
    pub settings: PlaybackSettings,

    /// Asset to configure before the first command
    pub asset: Option<AssetReference>,

    /// Per-observer notification buffer
    pub event_buffer_size: usize,

    /// Pending host commands and engine events queued for the controller
    pub command_buffer_size: usize,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("media_source", &"MediaSource { ... }")
            .field(
                "frame_sink",
                &self.frame_sink.as_ref().map(|_| "FrameSink { ... }"),
            )
            .field("settings", &self.settings)
            .field("asset", &self.asset)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("command_buffer_size", &self.command_buffer_size)
            .finish()
    }
}

impl PlayerConfig {
    /// Creates a new builder for constructing a `PlayerConfig`.
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.command_buffer_size == 0 {
            return Err(Error::Config(
                "Command buffer size must be greater than 0".to_string(),
            ));
        }

        self.settings.validate()
    }
}

fn media_source_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaSource".to_string(),
        message: "A MediaSource implementation is required to load and play assets. \
                 Wrap the host media engine (AVPlayer, ExoPlayer, GStreamer, HTMLVideoElement) \
                 and pass it with .media_source()."
            .to_string(),
    }
}

/// Builder for constructing [`PlayerConfig`] instances.
#[derive(Default)]
pub struct PlayerConfigBuilder {
    media_source: Option<Arc<dyn MediaSource>>,
    frame_sink: Option<Arc<dyn FrameSink>>,
    settings: Option<PlaybackSettings>,
    asset: Option<AssetReference>,
    event_buffer_size: Option<usize>,
    command_buffer_size: Option<usize>,
}

impl PlayerConfigBuilder {
    pub fn media_source(mut self, source: Arc<dyn MediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    pub fn frame_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.frame_sink = Some(sink);
        self
    }

    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn asset(mut self, asset: AssetReference) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn command_buffer_size(mut self, size: usize) -> Self {
        self.command_buffer_size = Some(size);
        self
    }

    /// Builds the final `PlayerConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no media source was provided
    /// - [`Error::Config`] when a buffer size is zero or settings are invalid
    pub fn build(self) -> Result<PlayerConfig> {
        let media_source = self.media_source.ok_or_else(media_source_missing_error)?;

        let config = PlayerConfig {
            media_source,
            frame_sink: self.frame_sink,
            settings: self.settings.unwrap_or_default(),
            asset: self.asset,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            command_buffer_size: self
                .command_buffer_size
                .unwrap_or(DEFAULT_COMMAND_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
