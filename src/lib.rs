//! VPLAY - embeddable frame-by-frame video playback engine
//!
//! Re-exports all modules for use by the binary target and host applications.

// Core engine (stream, timer, events, player)
pub mod core;

// Decoding, compositing and display boundaries
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod paths;
pub mod runner;

// Re-export commonly used types from core
pub use crate::core::event_bus::EventDispatcher;
pub use crate::core::player::{EngineError, PlaybackEngine, PlaybackState};
pub use crate::core::player_events::Command;
pub use crate::core::timer::{TickHandle, TickQueue, TickTimer};

pub use config::PlayerConfig;

// Re-export entities
pub use entities::{Bitmap, DisplaySurface, Frame, InputEvent, SourceOpener, StreamError, VideoSource};
