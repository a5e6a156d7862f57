//! StreamHandle - exclusive owner of the open video source
//!
//! Wraps at most one `VideoSource` and enforces the cursor rules:
//! - all queries read 0 / 0.0 while nothing is open
//! - `seek` clamps into `[0, frame_count)`
//! - `open` always releases the previous source first
//!
//! Only the playback engine holds a `StreamHandle`; nothing else ever sees
//! the raw decoder.

use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use crate::entities::frame::Frame;
use crate::entities::source::{SourceOpener, StreamError, VideoSource};

pub struct StreamHandle {
    opener: Box<dyn SourceOpener>,
    source: Option<Box<dyn VideoSource>>,
    path: Option<PathBuf>,
    /// Set when the source reported EndOfStream; some containers only
    /// estimate `frame_count`, so the cursor alone cannot tell
    exhausted: bool,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("path", &self.path)
            .field("open", &self.source.is_some())
            .field("cursor", &self.current_cursor())
            .finish()
    }
}

impl StreamHandle {
    pub fn new(opener: Box<dyn SourceOpener>) -> Self {
        Self {
            opener,
            source: None,
            path: None,
            exhausted: false,
        }
    }

    /// Release any held source, then open `path` with the cursor at 0
    pub fn open(&mut self, path: &Path) -> Result<(), StreamError> {
        self.close();
        let mut source = self.opener.open(path)?;
        if source.position() != 0 {
            source.seek(0)?;
        }
        debug!(
            "Stream opened: {} ({} frames @ {:.3} fps)",
            path.display(),
            source.frame_count(),
            source.frame_rate()
        );
        self.source = Some(source);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Release the source. No-op when already closed.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!("Stream closed: {:?}", self.path);
        }
        self.path = None;
        self.exhausted = false;
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn frame_rate(&self) -> f64 {
        self.source.as_ref().map(|s| s.frame_rate()).unwrap_or(0.0)
    }

    pub fn frame_count(&self) -> u64 {
        self.source.as_ref().map(|s| s.frame_count()).unwrap_or(0)
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.source.as_ref().map(|s| s.frame_size()).unwrap_or((0, 0))
    }

    pub fn current_cursor(&self) -> u64 {
        self.source.as_ref().map(|s| s.position()).unwrap_or(0)
    }

    /// True once decoding hit the end or the cursor ran past the last frame
    pub fn at_end(&self) -> bool {
        self.is_open()
            && (self.exhausted || (self.frame_count() > 0 && self.current_cursor() >= self.frame_count()))
    }

    /// Clamp into `[0, frame_count)` and reposition. Ignored while closed.
    pub fn seek(&mut self, frame_index: u64) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let clamped = frame_index.min(source.frame_count().saturating_sub(1));
        if let Err(e) = source.seek(clamped) {
            warn!("Seek to frame {} failed: {}", clamped, e);
            return;
        }
        self.exhausted = false;
        trace!("Cursor -> {} (requested {})", clamped, frame_index);
    }

    /// Decode the frame under the cursor without moving it
    pub fn decode_at_cursor(&mut self) -> Result<Frame, StreamError> {
        match self.source.as_mut() {
            Some(source) => source.decode_current(),
            None => Err(StreamError::EndOfStream),
        }
    }

    /// Decode the frame under the cursor and advance by one.
    /// `Err(EndOfStream)` once exhausted (or while closed).
    pub fn decode_next(&mut self) -> Result<Frame, StreamError> {
        let Some(source) = self.source.as_mut() else {
            return Err(StreamError::EndOfStream);
        };
        let result = source.read();
        if matches!(result, Err(StreamError::EndOfStream)) {
            self.exhausted = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::pattern::PatternSource;
    use crate::entities::source::DefaultOpener;

    fn handle() -> StreamHandle {
        StreamHandle::new(Box::new(DefaultOpener))
    }

    #[test]
    fn test_closed_queries_are_zero() {
        let h = handle();
        assert!(!h.is_open());
        assert_eq!(h.frame_rate(), 0.0);
        assert_eq!(h.frame_count(), 0);
        assert_eq!(h.current_cursor(), 0);
        assert_eq!(h.path(), None);
    }

    #[test]
    fn test_open_close_idempotent() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:300")).unwrap();
        assert_eq!(h.frame_count(), 300);
        h.close();
        h.close();
        assert_eq!(h.frame_count(), 0);
    }

    #[test]
    fn test_reopen_resets_cursor() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:300")).unwrap();
        h.seek(100);
        h.open(Path::new("pattern:8x8@24:48")).unwrap();
        assert_eq!(h.current_cursor(), 0);
        assert_eq!(h.frame_count(), 48);
    }

    #[test]
    fn test_open_failure_leaves_closed() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:300")).unwrap();
        let err = h.open(Path::new("pattern:bogus")).unwrap_err();
        assert!(matches!(err, StreamError::Unopenable(_)));
        assert!(!h.is_open());
    }

    #[test]
    fn test_seek_clamps() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:300")).unwrap();
        h.seek(10_000);
        assert_eq!(h.current_cursor(), 299);
        h.seek(0);
        assert_eq!(h.current_cursor(), 0);
    }

    #[test]
    fn test_decode_next_advances_until_end() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:3")).unwrap();
        for i in 0..3 {
            let frame = h.decode_next().unwrap();
            assert_eq!(PatternSource::stamped_index(frame.rgba_at(0, 0)), i);
        }
        assert_eq!(h.decode_next(), Err(StreamError::EndOfStream));
        assert!(h.at_end());
    }

    #[test]
    fn test_decode_at_cursor_keeps_position() {
        let mut h = handle();
        h.open(Path::new("pattern:8x8@30:30")).unwrap();
        h.seek(12);
        let frame = h.decode_at_cursor().unwrap();
        assert_eq!(PatternSource::stamped_index(frame.rgba_at(0, 0)), 12);
        assert_eq!(h.current_cursor(), 12);
    }

    #[test]
    fn test_end_detected_when_count_is_overstated() {
        let mut h = StreamHandle::new(Box::new(|_: &Path| -> Result<Box<dyn VideoSource>, StreamError> {
            Ok(Box::new(PatternSource::new(8, 8, 30.0, 3).with_declared_count(5)))
        }));
        h.open(Path::new("estimated.mp4")).unwrap();
        assert_eq!(h.frame_count(), 5);
        for _ in 0..3 {
            h.decode_next().unwrap();
        }
        assert!(!h.at_end());
        assert_eq!(h.decode_next(), Err(StreamError::EndOfStream));
        assert_eq!(h.current_cursor(), 3);
        assert!(h.at_end());

        h.seek(0);
        assert!(!h.at_end());
        h.seek(10);
        h.decode_next().unwrap_err();
        assert!(h.at_end());
        h.close();
        assert!(!h.at_end());
    }

    #[test]
    fn test_closed_decode_is_end_of_stream() {
        let mut h = handle();
        assert_eq!(h.decode_next(), Err(StreamError::EndOfStream));
        assert_eq!(h.decode_at_cursor(), Err(StreamError::EndOfStream));
    }
}
