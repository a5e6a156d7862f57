use clap::Parser;
use std::path::PathBuf;

#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (pattern sources only)";

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless frame-by-frame video player.
///
/// Reads control commands from stdin, one per line:
/// play, pause, stop, seek <secs>, size <w> <h>, load <path>, loop on|off, quit
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Video file to play (overrides `source` from the config file)
    #[arg(value_name = "FILE")]
    pub file_path: Option<PathBuf>,

    /// Play a synthetic test pattern instead of a file
    #[arg(long = "pattern", value_name = "WxH@FPS:FRAMES", conflicts_with = "file_path")]
    pub pattern: Option<String>,

    /// Display width in pixels
    #[arg(short = 'W', long = "width", value_name = "PX")]
    pub width: Option<u32>,

    /// Display height in pixels
    #[arg(short = 'H', long = "height", value_name = "PX")]
    pub height: Option<u32>,

    /// Auto-play on startup
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Loop at end of stream
    #[arg(short = 'o', long = "loop")]
    pub loop_playback: bool,

    /// Player config JSON (default: vplay.json in the config directory, if present)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write displayed frames as PNG files into DIR
    #[arg(long = "dump", value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// With --dump, keep only every Nth frame
    #[arg(long = "every", value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub every: u64,

    /// Enable debug logging to file (default: vplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "vplay", "clip.mp4", "-W", "320", "-H", "180", "-a", "-o", "--dump", "out", "--every", "5", "-vv",
        ])
        .unwrap();
        assert_eq!(args.file_path, Some(PathBuf::from("clip.mp4")));
        assert_eq!((args.width, args.height), (Some(320), Some(180)));
        assert!(args.autoplay && args.loop_playback);
        assert_eq!(args.dump_dir, Some(PathBuf::from("out")));
        assert_eq!(args.every, 5);
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, None);
    }

    #[test]
    fn test_log_flag_optional_value() {
        let args = Args::try_parse_from(["vplay", "-l"]).unwrap();
        assert_eq!(args.log_file, Some(None));
        let args = Args::try_parse_from(["vplay", "-l", "run.log"]).unwrap();
        assert_eq!(args.log_file, Some(Some(PathBuf::from("run.log"))));
    }

    #[test]
    fn test_pattern_conflicts_with_file() {
        assert!(Args::try_parse_from(["vplay", "a.mp4", "--pattern", "8x8@30:10"]).is_err());
        assert!(Args::try_parse_from(["vplay", "--every", "0"]).is_err());
    }
}
