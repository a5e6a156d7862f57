//! Entities module - frames and the collaborator boundaries around the engine
//!
//! - `source`: decoder boundary (`VideoSource`, `SourceOpener`)
//! - `loader_video` / `pattern`: the two stock sources
//! - `compositor`: letterboxing into the display size
//! - `surface`: where composited bitmaps go

pub mod compositor;
pub mod frame;
#[cfg(feature = "ffmpeg")]
pub mod loader_video;
pub mod pattern;
pub mod source;
pub mod surface;

pub use compositor::{compose, fit_rect, CompositeError, Placement};
pub use frame::{Bitmap, ColorOrder, Frame, PixelFormat, Rgba};
#[cfg(feature = "ffmpeg")]
pub use loader_video::FfmpegSource;
pub use pattern::PatternSource;
pub use source::{DefaultOpener, SourceOpener, StreamError, VideoSource};
pub use surface::{DisplaySurface, FrameDumpSurface, InputEvent, RecordingSurface, RoutedInput, SharedSurface};
