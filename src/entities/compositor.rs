//! Letterbox compositor - fits one decoded frame into a fixed display size.
//!
//! Pure function, no state. Steps:
//! 1. `scale = min(target_w / src_w, target_h / src_h)`
//! 2. Area-average resample to `(round(src_w * scale), round(src_h * scale))`
//! 3. Pad with the fill color to exactly the target size; odd padding puts
//!    the extra pixel on the bottom/right
//! 4. Write in the surface's channel order
//!
//! The area filter weights every source pixel by how much of it falls under
//! the destination pixel's footprint, so downscales average instead of
//! aliasing. Upscales degrade to a 1-2 tap blend, which is acceptable here.

use rayon::prelude::*;

use super::frame::{Bitmap, ColorOrder, Frame, Rgba};

/// Compositing errors. Always a caller bug, never stream content.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeError {
    InvalidTarget { width: u32, height: u32 },
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeError::InvalidTarget { width, height } => {
                write!(f, "Invalid display target {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for CompositeError {}

/// Where the scaled image lands inside the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Map a point in target space back to source-frame coordinates.
    /// `None` when the point falls on the letterbox padding.
    pub fn to_source(&self, src: (u32, u32), x: f32, y: f32) -> Option<(f32, f32)> {
        let lx = x - self.x as f32;
        let ly = y - self.y as f32;
        if lx < 0.0 || ly < 0.0 || lx >= self.width as f32 || ly >= self.height as f32 {
            return None;
        }
        Some((
            lx * src.0 as f32 / self.width as f32,
            ly * src.1 as f32 / self.height as f32,
        ))
    }
}

/// Reject zero-area targets
pub fn check_target(target: (u32, u32)) -> Result<(), CompositeError> {
    if target.0 == 0 || target.1 == 0 {
        return Err(CompositeError::InvalidTarget {
            width: target.0,
            height: target.1,
        });
    }
    Ok(())
}

/// Aspect-preserving fit of `src` inside `target`, centered
pub fn fit_rect(src: (u32, u32), target: (u32, u32)) -> Result<Placement, CompositeError> {
    check_target(target)?;
    let (sw, sh) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let (tw, th) = target;

    let scale = (tw as f64 / sw).min(th as f64 / sh);
    let width = ((sw * scale).round() as u32).clamp(1, tw);
    let height = ((sh * scale).round() as u32).clamp(1, th);

    // Integer halving leaves the odd pixel for right/bottom
    Ok(Placement {
        x: (tw - width) / 2,
        y: (th - height) / 2,
        width,
        height,
    })
}

/// Composite `frame` into a `target`-sized bitmap
pub fn compose(
    frame: &Frame,
    target: (u32, u32),
    fill: Rgba,
    order: ColorOrder,
) -> Result<Bitmap, CompositeError> {
    let place = fit_rect(frame.size(), target)?;
    let (tw, th) = (target.0 as usize, target.1 as usize);

    let xw = axis_taps(frame.width() as usize, place.width as usize);
    let yw = axis_taps(frame.height() as usize, place.height as usize);
    let fill_px = fill.to_order(order);

    let x0 = place.x as usize;
    let y0 = place.y as usize;
    let x1 = x0 + place.width as usize;
    let y1 = y0 + place.height as usize;

    let mut data = vec![0u8; tw * th * 4];
    data.par_chunks_mut(tw * 4).enumerate().for_each(|(y, row)| {
        for px in row.chunks_exact_mut(4) {
            px.copy_from_slice(&fill_px);
        }
        if y < y0 || y >= y1 {
            return;
        }
        let ytaps = &yw[y - y0];
        for x in x0..x1 {
            let rgba = sample_area(frame, &xw[x - x0], ytaps);
            let out = Rgba(rgba).to_order(order);
            row[x * 4..x * 4 + 4].copy_from_slice(&out);
        }
    });

    Ok(Bitmap::from_raw(target.0, target.1, order, data))
}

/// Per destination index: (source index, normalized weight) pairs
fn axis_taps(src: usize, dst: usize) -> Vec<Vec<(u32, f32)>> {
    let ratio = src as f64 / dst as f64;
    (0..dst)
        .map(|i| {
            let start = i as f64 * ratio;
            let end = (start + ratio).min(src as f64);
            let mut taps = Vec::with_capacity(ratio.ceil() as usize + 1);
            let mut total = 0.0;
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src {
                let cover = end.min(s as f64 + 1.0) - start.max(s as f64);
                if cover > 1e-9 {
                    taps.push((s as u32, cover));
                    total += cover;
                }
                s += 1;
            }
            if taps.is_empty() {
                // Float edge case at the far border
                return vec![((src - 1) as u32, 1.0)];
            }
            taps.into_iter().map(|(s, w)| (s, (w / total) as f32)).collect()
        })
        .collect()
}

#[inline]
fn sample_area(frame: &Frame, xtaps: &[(u32, f32)], ytaps: &[(u32, f32)]) -> [u8; 4] {
    let mut acc = [0.0f32; 4];
    for &(sy, wy) in ytaps {
        for &(sx, wx) in xtaps {
            let w = wx * wy;
            let px = frame.rgba_at(sx, sy);
            for c in 0..4 {
                acc[c] += px[c] as f32 * w;
            }
        }
    }
    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    const RED: Rgba = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_output_is_exactly_target_size() {
        let sources = [(1, 1), (640, 480), (1920, 1080), (7, 333), (333, 7)];
        let targets = [(1, 1), (320, 240), (100, 100), (99, 31), (31, 99)];
        for &(sw, sh) in &sources {
            let frame = Frame::solid(sw, sh, RED).unwrap();
            for &target in &targets {
                let bmp = compose(&frame, target, Rgba::BLACK, ColorOrder::Rgba).unwrap();
                assert_eq!(bmp.size(), target, "src {}x{}", sw, sh);
                assert_eq!(bmp.data().len(), (target.0 * target.1 * 4) as usize);
            }
        }
    }

    #[test]
    fn test_aspect_preserved_within_one_pixel() {
        let cases = [((1920, 1080), (640, 480)), ((480, 640), (300, 300)), ((1000, 10), (123, 77))];
        for (src, target) in cases {
            let p = fit_rect(src, target).unwrap();
            // Either width or height fills the target
            assert!(p.width == target.0 || p.height == target.1, "{:?}", p);
            let ideal_h = p.width as f64 * src.1 as f64 / src.0 as f64;
            let ideal_w = p.height as f64 * src.0 as f64 / src.1 as f64;
            assert!(
                (ideal_h - p.height as f64).abs() <= 1.0 || (ideal_w - p.width as f64).abs() <= 1.0,
                "distorted: {:?} for {:?} -> {:?}",
                p,
                src,
                target
            );
        }
    }

    #[test]
    fn test_letterbox_is_centered_with_odd_pixel_bottom_right() {
        // 2:1 source into 10x5 fills exactly; into 10x8 leaves 3 rows of padding
        let p = fit_rect((20, 10), (10, 8)).unwrap();
        assert_eq!(p, Placement { x: 0, y: 1, width: 10, height: 5 });

        let frame = Frame::solid(20, 10, RED).unwrap();
        let bmp = compose(&frame, (10, 8), Rgba::BLACK, ColorOrder::Rgba).unwrap();
        assert_eq!(bmp.rgba_at(0, 0), Rgba::BLACK.0);
        assert_eq!(bmp.rgba_at(5, 1), RED.0);
        assert_eq!(bmp.rgba_at(5, 5), RED.0);
        assert_eq!(bmp.rgba_at(5, 6), Rgba::BLACK.0);
        assert_eq!(bmp.rgba_at(9, 7), Rgba::BLACK.0);
    }

    #[test]
    fn test_pillarbox_fill_color() {
        let fill = Rgba([1, 2, 3, 255]);
        let frame = Frame::solid(10, 20, RED).unwrap();
        let bmp = compose(&frame, (11, 10), fill, ColorOrder::Rgba).unwrap();
        // 5x10 image, 6 columns of padding: 3 left, 3 right
        assert_eq!(fit_rect((10, 20), (11, 10)).unwrap().x, 3);
        assert_eq!(bmp.rgba_at(2, 4), fill.0);
        assert_eq!(bmp.rgba_at(3, 4), RED.0);
        assert_eq!(bmp.rgba_at(7, 4), RED.0);
        assert_eq!(bmp.rgba_at(8, 4), fill.0);
    }

    #[test]
    fn test_zero_target_is_error() {
        let frame = Frame::solid(4, 4, RED).unwrap();
        assert_eq!(
            compose(&frame, (0, 10), Rgba::BLACK, ColorOrder::Rgba),
            Err(CompositeError::InvalidTarget { width: 0, height: 10 })
        );
        assert!(compose(&frame, (10, 0), Rgba::BLACK, ColorOrder::Rgba).is_err());
    }

    #[test]
    fn test_area_average_downscale() {
        // 2x2 checker of black and white averages to mid grey
        let data = vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0];
        let frame = Frame::new(2, 2, PixelFormat::Rgb8, data).unwrap();
        let bmp = compose(&frame, (1, 1), Rgba::BLACK, ColorOrder::Rgba).unwrap();
        assert_eq!(bmp.rgba_at(0, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn test_upscale_keeps_solid_color() {
        let frame = Frame::solid(3, 2, RED).unwrap();
        let bmp = compose(&frame, (300, 200), Rgba::BLACK, ColorOrder::Rgba).unwrap();
        assert_eq!(bmp.rgba_at(150, 100), RED.0);
        assert_eq!(bmp.rgba_at(299, 199), RED.0);
    }

    #[test]
    fn test_bgra_output_order() {
        let frame = Frame::new(1, 1, PixelFormat::Bgr8, vec![30, 20, 10]).unwrap();
        let bmp = compose(&frame, (2, 2), Rgba::BLACK, ColorOrder::Bgra).unwrap();
        assert_eq!(&bmp.data()[..4], &[30, 20, 10, 255]);
        assert_eq!(bmp.rgba_at(1, 1), [10, 20, 30, 255]);
    }

    #[test]
    fn test_placement_maps_points_to_source() {
        let p = fit_rect((200, 100), (100, 100)).unwrap();
        assert_eq!(p.to_source((200, 100), 50.0, 10.0), None);
        let (sx, sy) = p.to_source((200, 100), 50.0, 50.0).unwrap();
        assert!((sx - 100.0).abs() < 1e-3);
        assert!((sy - 50.0).abs() < 1e-3);
    }
}
