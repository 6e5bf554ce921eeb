//! Consolidates per-frame AR tracking output into render-ready buffers.
//!
//! A [`frame_sync::FrameSync`] pulls one frame from a [`engine::TrackingEngine`]
//! per tick, keeps the live plane set and the marker slot table up to date, and
//! republishes everything as flat `f32` records a graphics layer can upload
//! without further conversion.

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod frame_sync;
pub mod io;
pub mod marker;
pub mod packer;
pub mod plane;
pub mod replay;
pub mod session;
pub mod types;
pub mod visualization;

pub use error::{ArError, Result};
pub use frame_sync::{FrameSync, TickOutcome};
