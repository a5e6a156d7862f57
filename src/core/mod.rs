//! Core engine modules - stream, timer, events, player
//!
//! These modules form the playback engine, independent of any window toolkit.

pub mod event_bus;
pub mod player;
pub mod player_events;
pub mod stream;
pub mod timer;

// Re-exports for convenience
pub use event_bus::EventDispatcher;
pub use player::{PlaybackEngine, PlaybackState};
pub use stream::StreamHandle;
pub use timer::{TickHandle, TickQueue, TickTimer};
