//! # Video Playback Core
//!
//! Drives playback of a single streaming or local video asset behind a small
//! observable state model.
//!
//! ## Overview
//!
//! - [`machine`]: the pure playback/buffering state machine and its session
//!   bookkeeping
//! - [`retry`]: bounded recovery from engine failures
//! - [`buffering`]: readiness tracking from engine signals
//! - [`player`]: the [`VideoPlayer`] controller that serializes host commands
//!   and engine callbacks onto one task
//!
//! The media engine and the rendering surface are host collaborators; see
//! [`bridge_traits::MediaSource`] and [`bridge_traits::FrameSink`].

pub mod buffering;
pub mod error;
pub mod machine;
pub mod player;
pub mod retry;

pub use buffering::BufferingMonitor;
pub use error::{PlaybackError, Result};
pub use machine::{clamp_seek, Action, PlaybackStateMachine, PlayerSnapshot, Transition};
pub use player::VideoPlayer;
pub use retry::{RetryDecision, RetryPolicy};

pub use bridge_traits::{
    AssetReference, BufferingState, FillMode, FrameSink, MediaEvent, MediaEventListener,
    MediaHandle, MediaSource, PlaybackState, SessionId,
};
pub use core_runtime::config::{PlaybackSettings, PlayerConfig, PlayerConfigBuilder};
pub use core_runtime::events::{EventStream, PlayerEvent};
