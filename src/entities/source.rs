//! Decoder boundary - the only surface the engine sees of a video library
//!
//! A `VideoSource` is one open, positionable stream of frames. A
//! `SourceOpener` turns a path into a source. Everything codec- or
//! container-specific (FFmpeg, synthetic patterns) lives behind these two
//! traits so the playback engine can be driven by fakes in tests.
//!
//! # Peek semantics
//!
//! `decode_current()` must not move the cursor. Sources whose decoder can
//! peek override it; the default implementation reads, then seeks back to
//! where it started. The fallback is only safe because the engine never
//! interleaves a mutation with a decode (everything runs on one context).

use std::path::Path;

use super::frame::{Frame, FrameError};
use super::pattern::PatternSource;

/// Stream-level failures
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Path missing, unsupported container, or no video track
    Unopenable(String),
    /// Corrupt data mid-stream; the stream itself may still be usable
    DecodeFailed(String),
    /// No more frames. Normal terminal signal of `read()`, not a failure
    EndOfStream,
}

impl StreamError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Unopenable(e) => write!(f, "Cannot open stream: {}", e),
            StreamError::DecodeFailed(e) => write!(f, "Decode failed: {}", e),
            StreamError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<FrameError> for StreamError {
    fn from(e: FrameError) -> Self {
        StreamError::DecodeFailed(e.to_string())
    }
}

/// An open, positionable source of sequential frames
pub trait VideoSource {
    /// Frames per second, 0.0 if the container does not say
    fn frame_rate(&self) -> f64;

    /// Total frames, 0 if unknown
    fn frame_count(&self) -> u64;

    /// Native frame dimensions
    fn frame_size(&self) -> (u32, u32);

    /// Index of the frame the next `read()` produces
    fn position(&self) -> u64;

    /// Reposition so the next `read()` produces `frame`
    fn seek(&mut self, frame: u64) -> Result<(), StreamError>;

    /// Decode the frame at `position()` and advance by one
    fn read(&mut self) -> Result<Frame, StreamError>;

    /// Decode the frame at `position()` without advancing
    fn decode_current(&mut self) -> Result<Frame, StreamError> {
        let pos = self.position();
        let frame = self.read();
        if self.position() != pos {
            self.seek(pos)?;
        }
        frame
    }
}

/// Opens sources by path
pub trait SourceOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, StreamError>;
}

impl<F> SourceOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn VideoSource>, StreamError>,
{
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, StreamError> {
        self(path)
    }
}

/// Standard opener: `pattern:WxH@FPS:FRAMES` paths produce a synthetic test
/// pattern, everything else goes to FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOpener;

impl SourceOpener for DefaultOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, StreamError> {
        let raw = path.to_string_lossy();
        if let Some(spec) = raw.strip_prefix(PatternSource::SCHEME) {
            return Ok(Box::new(PatternSource::parse(spec)?));
        }
        open_media_file(path)
    }
}

#[cfg(feature = "ffmpeg")]
fn open_media_file(path: &Path) -> Result<Box<dyn VideoSource>, StreamError> {
    Ok(Box::new(super::loader_video::FfmpegSource::open(path)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_media_file(path: &Path) -> Result<Box<dyn VideoSource>, StreamError> {
    Err(StreamError::Unopenable(format!(
        "{}: built without the `ffmpeg` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    /// Source without peek support: exercises the reseek fallback
    struct Forward {
        pos: u64,
        len: u64,
        seeks: u32,
    }

    impl VideoSource for Forward {
        fn frame_rate(&self) -> f64 {
            10.0
        }
        fn frame_count(&self) -> u64 {
            self.len
        }
        fn frame_size(&self) -> (u32, u32) {
            (1, 1)
        }
        fn position(&self) -> u64 {
            self.pos
        }
        fn seek(&mut self, frame: u64) -> Result<(), StreamError> {
            self.seeks += 1;
            self.pos = frame;
            Ok(())
        }
        fn read(&mut self) -> Result<Frame, StreamError> {
            if self.pos >= self.len {
                return Err(StreamError::EndOfStream);
            }
            let v = self.pos as u8;
            self.pos += 1;
            Ok(Frame::new(1, 1, PixelFormat::Rgb8, vec![v, v, v])?)
        }
    }

    #[test]
    fn test_default_decode_current_seeks_back() {
        let mut src = Forward { pos: 3, len: 5, seeks: 0 };
        let frame = src.decode_current().unwrap();
        assert_eq!(frame.rgba_at(0, 0)[0], 3);
        assert_eq!(src.position(), 3);
        assert_eq!(src.seeks, 1);
    }

    #[test]
    fn test_default_decode_current_at_end_does_not_seek() {
        let mut src = Forward { pos: 5, len: 5, seeks: 0 };
        assert_eq!(src.decode_current(), Err(StreamError::EndOfStream));
        assert_eq!(src.seeks, 0);
    }

    #[test]
    fn test_closure_opener() {
        let opener = |p: &Path| -> Result<Box<dyn VideoSource>, StreamError> {
            Err(StreamError::Unopenable(p.display().to_string()))
        };
        let err = opener.open(Path::new("missing.mp4")).err().unwrap();
        assert_eq!(err, StreamError::Unopenable("missing.mp4".into()));
    }

    #[test]
    fn test_default_opener_pattern_scheme() {
        let src = DefaultOpener.open(Path::new("pattern:64x32@30:90")).unwrap();
        assert_eq!(src.frame_size(), (64, 32));
        assert_eq!(src.frame_count(), 90);
        assert_eq!(src.frame_rate(), 30.0);
    }

    #[test]
    fn test_default_opener_bad_pattern_is_unopenable() {
        let err = DefaultOpener.open(Path::new("pattern:nonsense")).err().unwrap();
        assert!(matches!(err, StreamError::Unopenable(_)));
    }
}
