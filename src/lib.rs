//! Workspace placeholder crate.
//!
//! This crate exposes a single feature flag that maps onto the playback core
//! (`core-playback`) and its runtime support crate (`core-runtime`). Host
//! applications can depend on `video-player-workspace` and enable the
//! `playback` feature without wiring each crate individually.

#[cfg(feature = "playback")]
pub use core_playback as playback;

#[cfg(feature = "playback")]
pub use core_runtime as runtime;
