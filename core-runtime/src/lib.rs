//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the video player core:
//! - Logging and tracing infrastructure
//! - Player configuration and playback settings
//! - Per-controller notification bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback controller depends
//! on. It establishes the logging conventions, the configuration builder with
//! fail-fast validation, and the channel through which state changes reach
//! host observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
