//! Display surface boundary
//!
//! The engine writes composited bitmaps to a `DisplaySurface` but never owns
//! it: the host keeps its own handle (`SharedSurface`) to the same surface.
//! Raw input that lands on the video area is forwarded through
//! `notify()` instead of being bubbled up a widget tree.
//!
//! Stock surfaces:
//! - `RecordingSurface`: keeps the last bitmap plus counters (tests, stats)
//! - `FrameDumpSurface`: writes every Nth bitmap to a PNG file

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use super::frame::{Bitmap, ColorOrder};

/// Raw pointer/keyboard input captured over the video area
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PrimaryPress { x: f32, y: f32 },
    MiddlePress { x: f32, y: f32 },
    PointerEnter { x: f32, y: f32 },
    PointerLeave { x: f32, y: f32 },
    Space,
}

impl InputEvent {
    /// Pointer position in display coordinates; `None` for keys
    pub fn position(&self) -> Option<(f32, f32)> {
        match *self {
            InputEvent::PrimaryPress { x, y }
            | InputEvent::MiddlePress { x, y }
            | InputEvent::PointerEnter { x, y }
            | InputEvent::PointerLeave { x, y } => Some((x, y)),
            InputEvent::Space => None,
        }
    }
}

/// Input plus where it landed in source-frame pixels (`None` over the
/// letterbox, for keys, or with no stream open)
pub type RoutedInput = (InputEvent, Option<(f32, f32)>);

/// Something that can show composited frames
pub trait DisplaySurface {
    /// Channel order bitmaps must be delivered in
    fn color_order(&self) -> ColorOrder {
        ColorOrder::Rgba
    }

    /// Show a bitmap of exactly the engine's target size
    fn render(&mut self, bitmap: &Bitmap);

    /// Blank the display (after stop)
    fn clear(&mut self);

    /// Input from the video area, for the host to route. `frame_pos` is the
    /// pointer mapped into source-frame pixels.
    fn notify(&mut self, _event: InputEvent, _frame_pos: Option<(f32, f32)>) {}
}

/// Surface handle shared between host and engine
pub type SharedSurface = Arc<Mutex<dyn DisplaySurface + Send>>;

/// Wrap a surface for sharing; keep the returned `Arc<Mutex<S>>` to inspect it
pub fn shared<S: DisplaySurface + Send + 'static>(surface: S) -> (Arc<Mutex<S>>, SharedSurface) {
    let concrete = Arc::new(Mutex::new(surface));
    let erased: SharedSurface = concrete.clone();
    (concrete, erased)
}

/// Keeps the last bitmap and counts what happened
#[derive(Debug, Default)]
pub struct RecordingSurface {
    order: ColorOrder,
    last: Option<Bitmap>,
    rendered: u64,
    cleared: u64,
    inputs: Vec<RoutedInput>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(order: ColorOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<&Bitmap> {
        self.last.as_ref()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn cleared(&self) -> u64 {
        self.cleared
    }

    pub fn inputs(&self) -> &[RoutedInput] {
        &self.inputs
    }
}

impl DisplaySurface for RecordingSurface {
    fn color_order(&self) -> ColorOrder {
        self.order
    }

    fn render(&mut self, bitmap: &Bitmap) {
        self.rendered += 1;
        self.last = Some(bitmap.clone());
    }

    fn clear(&mut self) {
        self.cleared += 1;
        self.last = None;
    }

    fn notify(&mut self, event: InputEvent, frame_pos: Option<(f32, f32)>) {
        self.inputs.push((event, frame_pos));
    }
}

/// Writes every `every`-th rendered bitmap to `<dir>/frame_NNNNNN.png`
#[derive(Debug)]
pub struct FrameDumpSurface {
    dir: PathBuf,
    every: u64,
    rendered: u64,
    written: u64,
}

impl FrameDumpSurface {
    /// Create the output directory if needed
    pub fn new(dir: &Path, every: u64) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            rendered: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, n: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", n))
    }
}

impl DisplaySurface for FrameDumpSurface {
    fn render(&mut self, bitmap: &Bitmap) {
        let n = self.rendered;
        self.rendered += 1;
        if n % self.every != 0 {
            return;
        }
        let path = self.path_for(n);
        let result = image::save_buffer(
            &path,
            &bitmap.to_rgba_vec(),
            bitmap.width(),
            bitmap.height(),
            image::ExtendedColorType::Rgba8,
        );
        match result {
            Ok(()) => {
                self.written += 1;
                debug!("Wrote {}", path.display());
            }
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }

    fn clear(&mut self) {
        debug!("Display cleared after {} frames", self.rendered);
    }
}
