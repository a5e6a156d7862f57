//! Decoded frames and composited bitmaps
//!
//! **Why**: The decoder and the display surface disagree on layout.
//! Decoders hand back packed RGB/BGR/RGBA rows of arbitrary size; surfaces
//! want a fixed-size RGBA or BGRA bitmap. `Frame` is the former, `Bitmap`
//! the latter, and the compositor is the only thing that turns one into
//! the other.
//!
//! **Used by**: Video sources (produce `Frame`), compositor (consumes
//! `Frame`, produces `Bitmap`), display surfaces (consume `Bitmap`).
//!
//! # Lifetime
//!
//! Frames are transient: a frame is decoded, composited and dropped within
//! a single tick. Nothing in the engine keeps one around.

use serde::{Deserialize, Serialize};

/// Packed pixel layout of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,  // 3 bytes/pixel, R G B
    Bgr8,  // 3 bytes/pixel, B G R (OpenCV-style decoders)
    Rgba8, // 4 bytes/pixel, R G B A
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Channel order a display surface expects in its bitmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    #[default]
    Rgba,
    Bgra,
}

/// Straight (non-premultiplied) RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    /// Channels laid out in the given order
    pub fn to_order(self, order: ColorOrder) -> [u8; 4] {
        let [r, g, b, a] = self.0;
        match order {
            ColorOrder::Rgba => [r, g, b, a],
            ColorOrder::Bgra => [b, g, r, a],
        }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::BLACK
    }
}

/// Frame construction errors
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    EmptyDimensions { width: u32, height: u32 },
    BufferSize { expected: usize, actual: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::EmptyDimensions { width, height } => {
                write!(f, "Frame has empty dimensions {}x{}", width, height)
            }
            FrameError::BufferSize { expected, actual } => {
                write!(f, "Frame buffer is {} bytes, expected {}", actual, expected)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// One decoded video frame, tightly packed (no row padding)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed pixel buffer. Rejects empty dimensions and short/long buffers.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Frame filled with one color
    pub fn solid(width: u32, height: u32, color: Rgba) -> Result<Self, FrameError> {
        let px = color.0;
        let data = px.repeat(width as usize * height as usize);
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read pixel as RGBA regardless of storage format
    #[inline]
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.data[idx..idx + bpp];
        match self.format {
            PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
            PixelFormat::Bgr8 => [px[2], px[1], px[0], 255],
            PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
        }
    }
}

/// Composited, display-ready image of exactly the target size
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    order: ColorOrder,
    data: Vec<u8>,
}

impl Bitmap {
    /// Bitmap filled with `fill`
    pub fn filled(width: u32, height: u32, fill: Rgba, order: ColorOrder) -> Self {
        let data = fill.to_order(order).repeat(width as usize * height as usize);
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub(crate) fn from_raw(width: u32, height: u32, order: ColorOrder, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn order(&self) -> ColorOrder {
        self.order
    }

    /// Raw bytes in `order()` channel order, 4 bytes/pixel, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel converted back to RGBA
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.data[idx..idx + 4];
        match self.order {
            ColorOrder::Rgba => [px[0], px[1], px[2], px[3]],
            ColorOrder::Bgra => [px[2], px[1], px[0], px[3]],
        }
    }

    /// RGBA copy of the pixel data (for encoders that only take RGBA)
    pub fn to_rgba_vec(&self) -> Vec<u8> {
        match self.order {
            ColorOrder::Rgba => self.data.clone(),
            ColorOrder::Bgra => {
                let mut out = self.data.clone();
                for px in out.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                out
            }
        }
    }
}
