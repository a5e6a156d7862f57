//! PlayerConfig - construction-time engine settings
//!
//! Loaded from JSON (`vplay.json` or `--config FILE`), then overridden by
//! CLI flags. Every field but `source` has a default:
//!
//! ```json
//! { "source": "clip.mp4", "width": 640, "height": 360, "autoplay": true, "loop": false }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::entities::frame::Rgba;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
/// Slowest tick cadence used for timing: low-fps (or fps-less) streams
/// still tick at least this often
pub const DEFAULT_MIN_FRAME_RATE: f64 = 25.0;
/// Tick interval while paused (no decoding, just polling for resume)
pub const DEFAULT_PAUSED_POLL_MS: u64 = 50;

/// File name looked up in the config directory
pub const CONFIG_FILE_NAME: &str = "vplay.json";

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_true() -> bool {
    true
}

fn default_min_frame_rate() -> f64 {
    DEFAULT_MIN_FRAME_RATE
}

fn default_paused_poll_ms() -> u64 {
    DEFAULT_PAUSED_POLL_MS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Video file (or `pattern:WxH@FPS:FRAMES`)
    pub source: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Start playing as soon as the engine is built
    #[serde(default)]
    pub autoplay: bool,
    /// Rewind and keep playing at end of stream
    #[serde(default, rename = "loop")]
    pub looping: bool,
    /// Host hint only: whether to build transport controls
    #[serde(default = "default_true")]
    pub controls: bool,
    #[serde(default = "default_min_frame_rate")]
    pub min_frame_rate: f64,
    #[serde(default = "default_paused_poll_ms")]
    pub paused_poll_ms: u64,
    /// Letterbox color
    #[serde(default)]
    pub fill: Rgba,
}

impl PlayerConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            autoplay: false,
            looping: false,
            controls: true,
            min_frame_rate: DEFAULT_MIN_FRAME_RATE,
            paused_poll_ms: DEFAULT_PAUSED_POLL_MS,
            fill: Rgba::BLACK,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid player config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Failed to load config {}", path.display()))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("Display size must be non-zero, got {}x{}", self.width, self.height);
        }
        if !(self.min_frame_rate.is_finite() && self.min_frame_rate > 0.0) {
            bail!("min_frame_rate must be a positive number, got {}", self.min_frame_rate);
        }
        if self.paused_poll_ms == 0 {
            bail!("paused_poll_ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PlayerConfig::from_json_str(r#"{ "source": "clip.mp4" }"#).unwrap();
        assert_eq!(config, PlayerConfig::new("clip.mp4"));
        assert!(config.controls);
    }

    #[test]
    fn test_loop_key_maps_to_looping() {
        let config =
            PlayerConfig::from_json_str(r#"{ "source": "a.mp4", "loop": true, "height": 360, "fill": [255, 0, 0, 255] }"#)
                .unwrap();
        assert!(config.looping);
        assert_eq!(config.height, 360);
        assert_eq!(config.fill, Rgba([255, 0, 0, 255]));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"loop\":true"));
    }

    #[test]
    fn test_source_is_required() {
        assert!(PlayerConfig::from_json_str(r#"{ "width": 10 }"#).is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        assert!(PlayerConfig::from_json_str(r#"{ "source": "a", "width": 0 }"#).is_err());
        assert!(PlayerConfig::from_json_str(r#"{ "source": "a", "min_frame_rate": 0 }"#).is_err());
        assert!(PlayerConfig::from_json_str(r#"{ "source": "a", "paused_poll_ms": 0 }"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "source": "pattern:64x48@30:300", "autoplay": true }}"#).unwrap();
        let config = PlayerConfig::from_file(file.path()).unwrap();
        assert!(config.autoplay);
        assert_eq!(config.source, PathBuf::from("pattern:64x48@30:300"));
    }

    #[test]
    fn test_from_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlayerConfig::from_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.json"));
    }
}
