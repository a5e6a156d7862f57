//! Video decoder - FFmpeg-backed `VideoSource`
//!
//! Keeps one demuxer + decoder + scaler open for the lifetime of the
//! source and decodes sequentially. Seeking jumps to the nearest keyframe
//! before the target and decodes forward until the target PTS, so the cursor
//! lands on the requested frame within codec rounding.
//!
//! FFmpeg has no non-destructive peek, so `decode_current()` uses the
//! trait's reseek fallback.

use super::frame::{Frame, PixelFormat};
use super::source::{StreamError, VideoSource};
use log::{debug, trace, warn};
use playa_ffmpeg as ffmpeg;
use std::path::Path;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            warn!("FFmpeg init failed: {}", e);
        }
        unsafe {
            // AV_LOG_QUIET = -8 (silence all output including stderr)
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
        }
    });
}

pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_idx: usize,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u64,
    /// Frame duration in stream time base units, None if fps unknown
    frame_tb: Option<ffmpeg::ffi::AVRational>,
    stream_tb: ffmpeg::ffi::AVRational,
    start_pts: i64,
    position: u64,
    /// Frame decoded ahead during a seek, returned by the next read
    pending: Option<ffmpeg::util::frame::video::Video>,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        init_ffmpeg();

        if !path.exists() {
            return Err(StreamError::Unopenable(format!("{}: no such file", path.display())));
        }

        let input = ffmpeg::format::input(path)
            .map_err(|e| StreamError::Unopenable(format!("Failed to open video: {}", e)))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| StreamError::Unopenable("No video stream found".to_string()))?;
        let stream_idx = stream.index();

        let fps_rational = stream.avg_frame_rate();
        let time_base = stream.time_base();
        let fps = if fps_rational.denominator() != 0 {
            fps_rational.numerator() as f64 / fps_rational.denominator() as f64
        } else {
            0.0
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            let duration_secs =
                stream.duration() as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64;
            (duration_secs * fps).max(0.0) as u64
        };

        // AV_NOPTS_VALUE is i64::MIN
        let start_pts = match stream.start_time() {
            i64::MIN => 0,
            t => t,
        };

        let frame_tb = (fps_rational.numerator() > 0 && fps_rational.denominator() > 0).then(|| {
            ffmpeg::ffi::AVRational {
                num: fps_rational.denominator(),
                den: fps_rational.numerator(),
            }
        });
        let stream_tb = ffmpeg::ffi::AVRational {
            num: time_base.numerator(),
            den: time_base.denominator(),
        };

        let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| StreamError::Unopenable(format!("Failed to create decoder context: {}", e)))?;

        // Enable multi-threaded frame decoding
        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0; // Auto-detect CPU cores
        }

        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| StreamError::Unopenable(format!("Failed to create video decoder: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(StreamError::Unopenable("Video stream has no dimensions".to_string()));
        }

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| StreamError::Unopenable(format!("Failed to create scaler: {}", e)))?;

        debug!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames",
            path.display(),
            width,
            height,
            fps,
            frame_count
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_idx,
            width,
            height,
            fps,
            frame_count,
            frame_tb,
            stream_tb,
            start_pts,
            position: 0,
            pending: None,
            eof_sent: false,
        })
    }

    fn target_pts(&self, frame: u64) -> Option<i64> {
        let frame_tb = self.frame_tb?;
        let rel = unsafe { ffmpeg::ffi::av_rescale_q(frame as i64, frame_tb, self.stream_tb) };
        Some(self.start_pts + rel)
    }

    /// Pull the next decoded frame out of the codec, feeding packets as needed
    fn receive(&mut self) -> Result<Option<ffmpeg::util::frame::video::Video>, StreamError> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return Ok(Some(decoded)),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(_) if self.eof_sent => return Ok(None),
                Err(_) => {}
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_idx {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        return Err(StreamError::DecodeFailed(format!("Failed to send packet: {}", e)));
                    }
                }
                None => {
                    self.eof_sent = true;
                    self.decoder
                        .send_eof()
                        .map_err(|e| StreamError::DecodeFailed(format!("Failed to flush decoder: {}", e)))?;
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), StreamError> {
        self.input
            .seek(0, ..)
            .map_err(|e| StreamError::DecodeFailed(format!("Rewind failed: {}", e)))?;
        self.decoder.flush();
        self.position = 0;
        Ok(())
    }

    fn convert(&mut self, decoded: &ffmpeg::util::frame::video::Video) -> Result<Frame, StreamError> {
        let mut rgb = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgb)
            .map_err(|e| StreamError::DecodeFailed(format!("Failed to scale frame: {}", e)))?;

        let stride = rgb.stride(0);
        let row_bytes = self.width as usize * 3;
        let src = rgb.data(0);
        let mut output = vec![0u8; row_bytes * self.height as usize];
        for (y, dst) in output.chunks_exact_mut(row_bytes).enumerate() {
            let start = y * stride;
            dst.copy_from_slice(&src[start..start + row_bytes]);
        }
        Ok(Frame::new(self.width, self.height, PixelFormat::Rgb8, output)?)
    }
}

impl VideoSource for FfmpegSource {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<(), StreamError> {
        self.pending = None;
        self.eof_sent = false;

        let Some(target_ts) = self.target_pts(frame) else {
            // No timing info: only rewinding is possible
            if frame != 0 {
                warn!("Seek to frame {} without frame rate, rewinding instead", frame);
            }
            self.rewind()?;
            return Ok(());
        };

        let seek_ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                self.stream_idx as i32,
                target_ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if seek_ret < 0 {
            return Err(StreamError::DecodeFailed(format!("Video seek failed (ret={})", seek_ret)));
        }
        self.decoder.flush();

        // Decode forward to the first frame at or past the target
        while let Some(decoded) = self.receive()? {
            let reached = decoded.pts().map(|pts| pts >= target_ts).unwrap_or(true);
            if reached {
                self.pending = Some(decoded);
                break;
            }
        }
        self.position = frame;
        trace!("Seeked to frame {} (pts {})", frame, target_ts);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, StreamError> {
        let decoded = match self.pending.take() {
            Some(d) => d,
            None => self.receive()?.ok_or(StreamError::EndOfStream)?,
        };
        let frame = self.convert(&decoded)?;
        self.position += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat grey frames, luma `20 * index + 30` (limited range)
    const FRAMES: u64 = 10;

    fn luma(index: u64) -> u8 {
        (20 * index + 30) as u8
    }

    /// Uncompressed YUV4MPEG2 clip: 16x16, 10 fps, one grey level per frame
    fn write_y4m(path: &Path) {
        let mut data = b"YUV4MPEG2 W16 H16 F10:1 Ip A1:1 C420jpeg XCOLORRANGE=LIMITED\n".to_vec();
        for i in 0..FRAMES {
            data.extend_from_slice(b"FRAME\n");
            data.extend(std::iter::repeat(luma(i)).take(16 * 16));
            data.extend(std::iter::repeat(128u8).take(2 * 8 * 8));
        }
        std::fs::write(path, data).unwrap();
    }

    fn assert_grey(frame: &Frame, index: u64) {
        let [r, g, b, _] = frame.rgba_at(8, 8);
        let want = ((luma(index) as f64 - 16.0) * 255.0 / 219.0).round() as i32;
        for c in [r, g, b] {
            assert!((c as i32 - want).abs() <= 4, "frame {}: got {} want ~{}", index, c, want);
        }
    }

    #[test]
    fn test_missing_file_is_unopenable() {
        let err = FfmpegSource::open(Path::new("/definitely/not/here.mp4")).err().unwrap();
        assert!(matches!(err, StreamError::Unopenable(_)));
    }

    #[test]
    fn test_non_media_file_is_unopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"not a video at all").unwrap();
        let err = FfmpegSource::open(&path).err().unwrap();
        assert!(matches!(err, StreamError::Unopenable(_)));
    }

    #[test]
    fn test_seek_lands_on_requested_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grey.y4m");
        write_y4m(&path);

        let mut src = FfmpegSource::open(&path).unwrap();
        assert_eq!(src.frame_size(), (16, 16));
        assert!((src.frame_rate() - 10.0).abs() < 1e-6);
        assert_grey(&src.read().unwrap(), 0);
        assert_eq!(src.position(), 1);

        src.seek(6).unwrap();
        assert_eq!(src.position(), 6);
        assert_grey(&src.read().unwrap(), 6);

        // Backwards, then read through to the end
        src.seek(2).unwrap();
        let mut index = 2;
        loop {
            match src.read() {
                Ok(frame) => {
                    assert_grey(&frame, index);
                    index += 1;
                }
                Err(e) => {
                    assert_eq!(e, StreamError::EndOfStream);
                    break;
                }
            }
        }
        assert_eq!(index, FRAMES);
        assert_eq!(src.position(), FRAMES);
    }
}
