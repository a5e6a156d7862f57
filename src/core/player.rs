//! Playback engine - tick-driven frame pump with play/pause/stop/seek
//!
//! **Architecture**: The engine is the single writer of all playback state.
//! Every entry point takes `&mut self`, and ticks arrive through the same
//! `&mut self` (`tick(handle)`), so a tick and a mutation can never
//! interleave. There are no threads and no sleeps in here.
//!
//! **Owns**: the `StreamHandle` (and through it the decoder), the pending
//! tick handle. **Shares**: the display surface and the event dispatcher.
//!
//! # States
//!
//! - `Idle`: not playing, no tick scheduled
//! - `Playing`: ticking at `tick_delay()`, one decoded frame per tick
//! - `PausedActive`: ticking at the paused poll interval, cursor frozen
//!
//! # Tick Handles
//!
//! Each scheduled tick has a `TickHandle`; only the handle stored in
//! `pending_tick` is honoured. Cancelling or replacing the pending tick
//! (stop, seek, load, drop) therefore invalidates ticks the host may still
//! deliver late.
//!
//! # Seek While Playing
//!
//! Freeze (cancel the pending tick), reposition, unfreeze (schedule a fresh
//! tick). The next tick decodes from the new cursor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, trace, warn};

use super::event_bus::EventDispatcher;
use super::player_events::{Command, ENDED, LOAD, PAUSE, PLAY};
use super::stream::StreamHandle;
use super::timer::{TickHandle, TickQueue, TickTimer};
use crate::config::{PlayerConfig, DEFAULT_MIN_FRAME_RATE};
use crate::entities::compositor::{self, CompositeError};
use crate::entities::frame::{Frame, Rgba};
use crate::entities::source::{SourceOpener, StreamError};
use crate::entities::surface::{DisplaySurface, InputEvent, SharedSurface};

/// Errors surfaced by engine entry points
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Stream(StreamError),
    Composite(CompositeError),
    /// Construction-time settings the engine cannot run with
    Config(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Stream(e) => write!(f, "{}", e),
            EngineError::Composite(e) => write!(f, "{}", e),
            EngineError::Config(e) => write!(f, "Invalid player config: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StreamError> for EngineError {
    fn from(e: StreamError) -> Self {
        EngineError::Stream(e)
    }
}

impl From<CompositeError> for EngineError {
    fn from(e: CompositeError) -> Self {
        EngineError::Composite(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    PausedActive,
}

pub struct PlaybackEngine<T: TickTimer = TickQueue> {
    stream: StreamHandle,
    /// Path reopened by `play()` after a stop
    source: PathBuf,
    surface: SharedSurface,
    timer: T,
    events: EventDispatcher,

    // `!playing && paused` never holds
    playing: bool,
    paused: bool,
    looping: bool,

    target_size: (u32, u32),
    /// Resize arrived while playing; the next tick composes at the new size
    pending_resize: bool,
    /// Seek (seconds) requested while no stream was open
    pending_seek: Option<f64>,
    pending_tick: Option<TickHandle>,

    fill: Rgba,
    min_frame_rate: f64,
    paused_poll: Duration,
}

impl<T: TickTimer> std::fmt::Debug for PlaybackEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state())
            .field("stream", &self.stream)
            .field("target_size", &self.target_size)
            .field("looping", &self.looping)
            .field("pending_tick", &self.pending_tick)
            .finish()
    }
}

impl<T: TickTimer> PlaybackEngine<T> {
    /// Build an engine and load `config.source`.
    ///
    /// Fires `load` (listeners registered on `events` beforehand see it),
    /// then starts playback if `config.autoplay` is set.
    pub fn new(
        config: &PlayerConfig,
        opener: Box<dyn SourceOpener>,
        surface: SharedSurface,
        timer: T,
        events: EventDispatcher,
    ) -> Result<Self, EngineError> {
        let target_size = (config.width, config.height);
        compositor::check_target(target_size)?;
        config
            .validate()
            .map_err(|e| EngineError::Config(format!("{:#}", e)))?;

        let mut engine = Self {
            stream: StreamHandle::new(opener),
            source: config.source.clone(),
            surface,
            timer,
            events,
            playing: false,
            paused: false,
            looping: config.looping,
            target_size,
            pending_resize: false,
            pending_seek: None,
            pending_tick: None,
            fill: config.fill,
            min_frame_rate: config.min_frame_rate,
            paused_poll: Duration::from_millis(config.paused_poll_ms),
        };

        engine.load(&config.source)?;
        if config.autoplay {
            engine.play()?;
        }
        Ok(engine)
    }

    // ========== Lifecycle ==========

    /// Stop whatever is active, open `path` with the cursor at 0, fire `load`
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        self.stop();
        self.source = path.to_path_buf();
        self.pending_seek = None;
        self.stream.open(path)?;
        info!(
            "Loaded {} ({} frames @ {:.3} fps)",
            path.display(),
            self.stream.frame_count(),
            self.stream.frame_rate()
        );
        self.events.dispatch(LOAD);
        Ok(())
    }

    /// Start or resume playback. No-op while already playing.
    ///
    /// From `Idle` the stream is reopened if a stop released it, and a
    /// cursor left at the end is rewound first.
    pub fn play(&mut self) -> Result<(), EngineError> {
        match self.state() {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::PausedActive => {
                self.paused = false;
                info!("Playback resumed at frame {}", self.stream.current_cursor());
                self.events.dispatch(PLAY);
                return Ok(());
            }
            PlaybackState::Idle => {}
        }

        if !self.stream.is_open() {
            self.stream.open(&self.source)?;
        }
        if let Some(seconds) = self.pending_seek.take() {
            let frame = self.frame_at(seconds);
            self.stream.seek(frame);
        } else if self.stream.at_end() {
            self.stream.seek(0);
        }

        self.playing = true;
        self.paused = false;
        self.schedule_tick(Duration::ZERO);
        info!("Playback started at frame {}", self.stream.current_cursor());
        self.events.dispatch(PLAY);
        Ok(())
    }

    /// Suspend ticking with the cursor frozen. Only acts while `Playing`.
    pub fn pause(&mut self) {
        if self.state() != PlaybackState::Playing {
            return;
        }
        self.paused = true;
        info!("Playback paused at frame {}", self.stream.current_cursor());
        self.events.dispatch(PAUSE);
    }

    /// Back to `Idle`: cancel ticking, release the stream, blank the display
    /// and fire `pause`. Nothing happens when idle with no stream open.
    pub fn stop(&mut self) {
        if !self.playing && !self.stream.is_open() {
            return;
        }
        self.cancel_tick();
        self.playing = false;
        self.paused = false;
        self.pending_resize = false;
        self.pending_seek = None;
        self.stream.close();
        self.lock_surface().clear();
        info!("Playback stopped");
        self.events.dispatch(PAUSE);
    }

    pub fn set_looping(&mut self, looping: bool) {
        debug!("Looping {}", if looping { "on" } else { "off" });
        self.looping = looping;
    }

    /// Run one host command
    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        trace!("Applying {:?}", command);
        match command {
            Command::Play => self.play()?,
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::Seek(seconds) => self.set_current_time(seconds),
            Command::Resize(w, h) => self.set_target_size(w, h)?,
            Command::Load(path) => self.load(path)?,
            Command::SetLoop(on) => self.set_looping(on),
        }
        Ok(())
    }

    // ========== Time & Size ==========

    /// Cursor position in seconds; 0 when closed or fps is unknown
    pub fn current_time(&self) -> f64 {
        let fps = self.stream.frame_rate();
        if fps > 0.0 {
            self.stream.current_cursor() as f64 / fps
        } else {
            0.0
        }
    }

    /// Move the cursor to `round(seconds * fps)`, clamped into the stream.
    ///
    /// Playing: the tick is frozen around the reposition. Idle or paused
    /// with a stream open: the new frame is shown immediately. With no
    /// stream open the request is kept for the next `play()`.
    pub fn set_current_time(&mut self, seconds: f64) {
        if !self.stream.is_open() {
            debug!("Seek to {:.3}s deferred until the stream is reopened", seconds);
            self.pending_seek = Some(seconds);
            return;
        }

        let frame = self.frame_at(seconds);
        debug!("Seek to {:.3}s (frame {})", seconds, frame);
        match self.state() {
            PlaybackState::Playing => {
                self.freeze_tick();
                self.stream.seek(frame);
                self.unfreeze_tick();
            }
            PlaybackState::PausedActive | PlaybackState::Idle => {
                self.stream.seek(frame);
                self.display_current_frame();
            }
        }
    }

    /// Stream length in seconds; 0 when closed or fps is unknown
    pub fn duration(&self) -> f64 {
        let fps = self.stream.frame_rate();
        if fps > 0.0 {
            self.stream.frame_count() as f64 / fps
        } else {
            0.0
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Change the display size. Paused: recompose now. Playing: the next
    /// tick picks it up. Zero in either dimension is rejected.
    pub fn set_target_size(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        compositor::check_target((width, height))?;
        if (width, height) == self.target_size {
            return Ok(());
        }
        debug!(
            "Resize {}x{} -> {}x{}",
            self.target_size.0, self.target_size.1, width, height
        );
        self.target_size = (width, height);

        match self.state() {
            PlaybackState::Playing => self.pending_resize = true,
            PlaybackState::PausedActive => self.display_current_frame(),
            PlaybackState::Idle => {}
        }
        Ok(())
    }

    // ========== Queries ==========

    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.paused) {
            (true, false) => PlaybackState::Playing,
            (true, true) => PlaybackState::PausedActive,
            (false, _) => PlaybackState::Idle,
        }
    }

    /// True in both `Playing` and `PausedActive`
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn cursor(&self) -> u64 {
        self.stream.current_cursor()
    }

    pub fn frame_rate(&self) -> f64 {
        self.stream.frame_rate()
    }

    pub fn frame_count(&self) -> u64 {
        self.stream.frame_count()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Delay between frames: `round(1000 / max(fps, min_frame_rate))` ms
    pub fn tick_delay(&self) -> Duration {
        let floor = if self.min_frame_rate.is_finite() && self.min_frame_rate > 0.0 {
            self.min_frame_rate
        } else {
            DEFAULT_MIN_FRAME_RATE
        };
        let fps = self.stream.frame_rate();
        let rate = if fps.is_finite() { fps.max(floor) } else { floor };
        Duration::from_millis((1000.0 / rate).round() as u64)
    }

    // ========== Events & Input ==========

    /// Register a lifecycle listener (`load`, `play`, `pause`, `ended`)
    pub fn on<F>(&self, event: &str, listener: F)
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on(event, listener);
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Hand input over the video area to the surface, with pointer
    /// positions mapped into the current frame
    pub fn forward_input(&mut self, event: InputEvent) {
        let frame_pos = event.position().and_then(|(x, y)| self.frame_point(x, y));
        trace!("Input {:?} -> frame {:?}", event, frame_pos);
        self.lock_surface().notify(event, frame_pos);
    }

    /// Map a display point into source-frame pixels through the letterbox.
    /// `None` on the padding or while no stream is open.
    pub fn frame_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if !self.stream.is_open() {
            return None;
        }
        let src = self.stream.frame_size();
        compositor::fit_rect(src, self.target_size).ok()?.to_source(src, x, y)
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    // ========== Tick ==========

    /// Run a tick previously scheduled by this engine.
    ///
    /// Handles other than the pending one (cancelled, superseded, or from
    /// before a stop) are ignored.
    pub fn tick(&mut self, handle: TickHandle) {
        if self.pending_tick != Some(handle) {
            trace!("Ignoring stale tick {:?}", handle);
            return;
        }
        self.pending_tick = None;

        match self.state() {
            PlaybackState::Idle => {}
            PlaybackState::PausedActive => self.schedule_tick(self.paused_poll),
            PlaybackState::Playing => self.advance(),
        }
    }

    /// Decode, show, reschedule. End of stream loops or finishes.
    fn advance(&mut self) {
        if std::mem::take(&mut self.pending_resize) {
            trace!("Composing at new size {:?}", self.target_size);
        }

        match self.stream.decode_next() {
            Ok(frame) => {
                trace!("Frame {} displayed", self.stream.current_cursor().saturating_sub(1));
                self.present(&frame);
                self.schedule_tick(self.tick_delay());
            }
            Err(StreamError::EndOfStream) if self.looping => {
                self.stream.seek(0);
                match self.stream.decode_next() {
                    Ok(frame) => {
                        debug!("Looped to start");
                        self.present(&frame);
                        self.schedule_tick(self.tick_delay());
                    }
                    Err(e) => self.finish(e),
                }
            }
            Err(e) => self.finish(e),
        }
    }

    /// Playback is over: go idle (stream stays open) and fire `ended`
    fn finish(&mut self, reason: StreamError) {
        if reason.is_end_of_stream() {
            info!("Playback ended at frame {}", self.stream.current_cursor());
        } else {
            warn!("Playback aborted at frame {}: {}", self.stream.current_cursor(), reason);
        }
        self.cancel_tick();
        self.playing = false;
        self.paused = false;
        self.pending_resize = false;
        self.events.dispatch(ENDED);
    }

    // ========== Helpers ==========

    fn frame_at(&self, seconds: f64) -> u64 {
        let fps = self.stream.frame_rate();
        if fps > 0.0 && seconds.is_finite() {
            (seconds.max(0.0) * fps).round() as u64
        } else {
            0
        }
    }

    fn schedule_tick(&mut self, delay: Duration) {
        self.cancel_tick();
        self.pending_tick = Some(self.timer.schedule(delay));
    }

    fn cancel_tick(&mut self) {
        if let Some(handle) = self.pending_tick.take() {
            self.timer.cancel(handle);
        }
    }

    fn freeze_tick(&mut self) {
        self.cancel_tick();
    }

    fn unfreeze_tick(&mut self) {
        if self.state() == PlaybackState::Playing {
            self.schedule_tick(self.tick_delay());
        }
    }

    fn lock_surface(&self) -> std::sync::MutexGuard<'_, dyn DisplaySurface + Send + 'static> {
        self.surface.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn display_current_frame(&mut self) {
        match self.stream.decode_at_cursor() {
            Ok(frame) => self.present(&frame),
            Err(StreamError::EndOfStream) => trace!("Nothing to display past the end"),
            Err(e) => warn!("Cannot display frame {}: {}", self.stream.current_cursor(), e),
        }
    }

    fn present(&self, frame: &Frame) {
        let mut surface = self.lock_surface();
        match compositor::compose(frame, self.target_size, self.fill, surface.color_order()) {
            Ok(bitmap) => surface.render(&bitmap),
            Err(e) => warn!("Compose failed: {}", e),
        }
    }
}

impl PlaybackEngine<TickQueue> {
    /// Pop the earliest due tick from the stock queue and run it.
    /// Returns false when nothing was due.
    pub fn fire_due_tick(&mut self) -> bool {
        match self.timer.pop_due() {
            Some(handle) => {
                self.tick(handle);
                true
            }
            None => false,
        }
    }
}

impl<T: TickTimer> Drop for PlaybackEngine<T> {
    fn drop(&mut self) {
        self.cancel_tick();
    }
}
