//! Synthetic test-pattern source
//!
//! Generates frames on the fly: a horizontal gradient with a vertical bar
//! that sweeps across the frame over the clip. The frame index is stamped
//! into the top-left pixel (R = low byte, G = high byte) so tests and the
//! `--pattern` CLI mode can tell which frame reached the surface.
//!
//! Addressed by path as `pattern:WxH@FPS:FRAMES`, e.g. `pattern:320x240@30:300`.

use super::frame::{Frame, PixelFormat};
use super::source::{StreamError, VideoSource};

#[derive(Debug, Clone)]
pub struct PatternSource {
    width: u32,
    height: u32,
    fps: f64,
    frames: u64,
    /// Length reported by `frame_count()` when it differs from `frames`
    declared: Option<u64>,
    position: u64,
    corrupt: Vec<u64>,
}

impl PatternSource {
    /// Path prefix recognised by `DefaultOpener`
    pub const SCHEME: &'static str = "pattern:";

    pub fn new(width: u32, height: u32, fps: f64, frames: u64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: fps.max(0.0),
            frames,
            declared: None,
            position: 0,
            corrupt: Vec::new(),
        }
    }

    /// Make `read()` fail with `DecodeFailed` at `frame`
    pub fn with_corrupt_frame(mut self, frame: u64) -> Self {
        self.corrupt.push(frame);
        self
    }

    /// Report `count` frames while still producing the real number, like a
    /// container whose length is estimated from its duration
    pub fn with_declared_count(mut self, count: u64) -> Self {
        self.declared = Some(count);
        self
    }

    /// Parse `WxH@FPS:FRAMES` (the part after `pattern:`)
    pub fn parse(spec: &str) -> Result<Self, StreamError> {
        let bad = || StreamError::Unopenable(format!("invalid pattern spec '{}', expected WxH@FPS:FRAMES", spec));

        let (size, timing) = spec.split_once('@').ok_or_else(bad)?;
        let (w, h) = size.split_once('x').ok_or_else(bad)?;
        let (fps, frames) = timing.split_once(':').ok_or_else(bad)?;

        let width: u32 = w.trim().parse().map_err(|_| bad())?;
        let height: u32 = h.trim().parse().map_err(|_| bad())?;
        let fps: f64 = fps.trim().parse().map_err(|_| bad())?;
        let frames: u64 = frames.trim().parse().map_err(|_| bad())?;

        if width == 0 || height == 0 || !fps.is_finite() || fps < 0.0 {
            return Err(bad());
        }
        Ok(Self::new(width, height, fps, frames))
    }

    /// Frame index stamped into a frame's top-left pixel
    pub fn stamped_index(rgba: [u8; 4]) -> u64 {
        rgba[0] as u64 | ((rgba[1] as u64) << 8)
    }

    fn render(&self, index: u64) -> Result<Frame, StreamError> {
        if self.corrupt.contains(&index) {
            return Err(StreamError::DecodeFailed(format!("corrupt pattern frame {}", index)));
        }

        let (w, h) = (self.width as usize, self.height as usize);
        let bar_x = if self.frames > 0 {
            (index as usize * w) / self.frames as usize
        } else {
            0
        };

        let mut data = Vec::with_capacity(w * h * 3);
        for _y in 0..h {
            for x in 0..w {
                if x == bar_x {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    let v = ((x * 255) / w.max(1)) as u8;
                    data.extend_from_slice(&[v, 64, 255 - v]);
                }
            }
        }
        data[0] = (index & 0xff) as u8;
        data[1] = ((index >> 8) & 0xff) as u8;

        Ok(Frame::new(self.width, self.height, PixelFormat::Rgb8, data)?)
    }
}

impl VideoSource for PatternSource {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.declared.unwrap_or(self.frames)
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<(), StreamError> {
        self.position = frame.min(self.frames);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, StreamError> {
        let frame = self.decode_current()?;
        self.position += 1;
        Ok(frame)
    }

    // Frames are generated, so peeking is free
    fn decode_current(&mut self) -> Result<Frame, StreamError> {
        if self.position >= self.frames {
            return Err(StreamError::EndOfStream);
        }
        self.render(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let src = PatternSource::parse("320x240@29.97:100").unwrap();
        assert_eq!(src.frame_size(), (320, 240));
        assert_eq!(src.frame_rate(), 29.97);
        assert_eq!(src.frame_count(), 100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for spec in ["", "320x240", "0x10@30:10", "axb@30:10", "10x10@-1:10", "10x10@30"] {
            assert!(PatternSource::parse(spec).is_err(), "accepted '{}'", spec);
        }
    }

    #[test]
    fn test_read_advances_and_stamps_index() {
        let mut src = PatternSource::new(4, 2, 30.0, 300);
        src.seek(257).unwrap();
        let frame = src.read().unwrap();
        assert_eq!(PatternSource::stamped_index(frame.rgba_at(0, 0)), 257);
        assert_eq!(src.position(), 258);
    }

    #[test]
    fn test_end_of_stream() {
        let mut src = PatternSource::new(2, 2, 10.0, 1);
        assert!(src.read().is_ok());
        assert_eq!(src.read(), Err(StreamError::EndOfStream));
        assert_eq!(src.position(), 1);
    }

    #[test]
    fn test_corrupt_frame_does_not_advance() {
        let mut src = PatternSource::new(2, 2, 10.0, 5).with_corrupt_frame(2);
        src.seek(2).unwrap();
        assert!(matches!(src.read(), Err(StreamError::DecodeFailed(_))));
        assert_eq!(src.position(), 2);
    }

    #[test]
    fn test_decode_current_is_non_destructive() {
        let mut src = PatternSource::new(2, 2, 10.0, 5);
        src.seek(3).unwrap();
        let a = src.decode_current().unwrap();
        let b = src.decode_current().unwrap();
        assert_eq!(a, b);
        assert_eq!(src.position(), 3);
    }
}
