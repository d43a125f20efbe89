//! # Host Bridge Traits
//!
//! Contracts between the playback core and the host platform.
//!
//! ## Overview
//!
//! The core never decodes or renders video itself. It drives a media engine
//! the host already has and tells a host surface what to show. This crate
//! defines exactly the capabilities the core needs from those collaborators,
//! plus the value types that cross the boundary.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaSource`](playback::MediaSource) - Load, play, pause, stop and seek an asset
//! - [`MediaEventListener`](playback::MediaEventListener) - Asynchronous ready/stall/end/failure reports
//!
//! ### Presentation
//! - [`FrameSink`](sink::FrameSink) - Surface that displays decoded frames
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Mirror structured logs into the host's log
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! flatten native engine errors into it; the core only distinguishes "the
//! load failed" from "the call failed".
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Media sources in particular may
//! report events from engine-owned threads while the core is issuing calls.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::playback::{AssetReference, MediaEventListener, MediaHandle, MediaSource};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! pub struct GstMediaSource { /* ... */ }
//!
//! #[async_trait]
//! impl MediaSource for GstMediaSource {
//!     async fn load(
//!         &self,
//!         asset: &AssetReference,
//!         listener: Arc<dyn MediaEventListener>,
//!     ) -> Result<MediaHandle> {
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod logger;
pub mod playback;
pub mod sink;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{
    AssetHandle, AssetLocator, AssetReference, BufferingState, MediaEvent, MediaEventListener,
    MediaHandle, MediaSource, PlaybackState, SessionId,
};
pub use sink::{FillMode, FrameSink};
pub use logger::{LogEntry, LogLevel, LoggerSink, StderrLogger};
