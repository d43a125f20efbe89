//! Playback bridge traits and supporting media types.
//!
//! These abstractions let the core playback controller drive a host media
//! engine (AVFoundation, GStreamer, a browser `<video>` element, ...) without
//! knowing anything about decoding or transport. The engine is treated as a
//! black box that can load an asset, play, pause, stop and seek it, and that
//! reports readiness, stalls, end of media and failures on its own schedule.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Asset Types
// ============================================================================

/// Identifier of an asset the host already resolved with its media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetHandle(u64);

impl AssetHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Location of an asset that still has to be resolved by the media source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AssetLocator {
    /// Remote HTTP(S) or streaming URL.
    Url { url: String },
    /// File accessible to the host runtime.
    File { path: PathBuf },
}

/// The asset a controller plays.
///
/// Exactly one representation is authoritative: assigning a locator replaces a
/// previously resolved handle and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetReference {
    Handle(AssetHandle),
    Locator(AssetLocator),
}

impl AssetReference {
    /// Reference a remote asset by URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Locator(AssetLocator::Url { url: url.into() })
    }

    /// Reference a local asset by path.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::Locator(AssetLocator::File { path: path.into() })
    }

    /// Reference an asset the engine already resolved.
    pub fn handle(handle: AssetHandle) -> Self {
        Self::Handle(handle)
    }

    pub fn as_handle(&self) -> Option<AssetHandle> {
        match self {
            Self::Handle(handle) => Some(*handle),
            Self::Locator(_) => None,
        }
    }

    pub fn as_locator(&self) -> Option<&AssetLocator> {
        match self {
            Self::Handle(_) => None,
            Self::Locator(locator) => Some(locator),
        }
    }

    /// Determine whether loading this asset involves the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Locator(AssetLocator::Url { .. }))
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(handle) => write!(f, "asset#{}", handle.id()),
            Self::Locator(AssetLocator::Url { url }) => f.write_str(url),
            Self::Locator(AssetLocator::File { path }) => write!(f, "{}", path.display()),
        }
    }
}

// ============================================================================
// Session & Handle Identifiers
// ============================================================================

/// Handle allocated by a [`MediaSource`] for one loaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(u64);

impl MediaHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Monotonically increasing identifier of one load attempt.
///
/// Every new load, retry or stop moves the controller to a newer session;
/// events tagged with an older session are discarded.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionId(u64);

impl SessionId {
    pub const INITIAL: SessionId = SessionId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The session that supersedes this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Observable States
// ============================================================================

/// Playback lifecycle state exposed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Retries are exhausted; only a new play command leaves this state.
    Failed,
}

impl PlaybackState {
    /// Returns `true` while the controller holds (or is re-acquiring) a load.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Engine-level data availability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferingState {
    #[default]
    Unknown,
    Ready,
    Delayed,
}

impl fmt::Display for BufferingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BufferingState::Unknown => "unknown",
            BufferingState::Ready => "ready",
            BufferingState::Delayed => "delayed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Engine Events
// ============================================================================

/// Lifecycle signal reported by a media source for a loaded handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum MediaEvent {
    /// Enough data is available to play without stalling.
    Ready,
    /// Playback is (or would be) starved of data.
    Stalled,
    /// The end of the asset was reached.
    ReachedEnd,
    /// The engine gave up on the asset. Richer native causes are flattened
    /// into `reason` by the adapter.
    Failed { reason: String },
    /// Periodic playback position update.
    Progress { position: Duration },
}

impl MediaEvent {
    pub fn failed(reason: impl Into<String>) -> Self {
        MediaEvent::Failed {
            reason: reason.into(),
        }
    }
}

/// Receiver for media events.
///
/// A fresh listener is handed to every [`MediaSource::load`] call. Adapters may
/// invoke it from any thread, at any time, including before `load` returns.
pub trait MediaEventListener: Send + Sync {
    fn on_event(&self, handle: MediaHandle, event: MediaEvent);
}

// ============================================================================
// Media Source Adapter
// ============================================================================

/// Host media engine wrapper.
///
/// Implementations translate these calls into the native engine and report
/// asynchronous progress through the listener given to [`load`](Self::load).
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Begin loading `asset`. The returned handle identifies the load in all
    /// subsequent calls and events.
    async fn load(
        &self,
        asset: &AssetReference,
        listener: Arc<dyn MediaEventListener>,
    ) -> Result<MediaHandle>;

    async fn play(&self, handle: MediaHandle) -> Result<()>;

    async fn pause(&self, handle: MediaHandle) -> Result<()>;

    /// Halt playback and release engine resources held for `handle`.
    async fn stop(&self, handle: MediaHandle) -> Result<()>;

    async fn seek(&self, handle: MediaHandle, position: Duration) -> Result<()>;

    /// Duration of the loaded asset, `None` while the engine has not
    /// determined it (or for live streams).
    async fn current_duration(&self, handle: MediaHandle) -> Option<Duration>;

    async fn set_muted(&self, _handle: MediaHandle, _muted: bool) -> Result<()> {
        Ok(())
    }
}
