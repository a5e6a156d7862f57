//! Player lifecycle events and host commands.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

// === Lifecycle Events ===

/// Stream opened
pub const LOAD: &str = "load";
/// Playback started or resumed
pub const PLAY: &str = "play";
/// Explicit pause, and also stop
pub const PAUSE: &str = "pause";
/// Natural end of stream (or mid-stream decode failure)
pub const ENDED: &str = "ended";

/// All names the engine ever dispatches
pub const ALL_EVENTS: [&str; 4] = [LOAD, PLAY, PAUSE, ENDED];

// === Host Commands ===

/// A queued mutation request, applied between ticks via `PlaybackEngine::apply`
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    /// Seek to a time in seconds
    Seek(f64),
    Resize(u32, u32),
    Load(PathBuf),
    SetLoop(bool),
}

/// Parses control lines: `play`, `pause`, `stop`, `seek <secs>`,
/// `size <w> <h>`, `load <path>`, `loop on|off`
impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "stop" => Command::Stop,
            "seek" => {
                let secs: f64 = rest.parse().with_context(|| format!("bad seek time '{}'", rest))?;
                if !secs.is_finite() {
                    bail!("bad seek time '{}'", rest);
                }
                Command::Seek(secs)
            }
            "size" | "resize" => {
                let mut parts = rest.split_whitespace();
                let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
                    bail!("usage: size <width> <height>");
                };
                Command::Resize(
                    w.parse().with_context(|| format!("bad width '{}'", w))?,
                    h.parse().with_context(|| format!("bad height '{}'", h))?,
                )
            }
            "load" => {
                if rest.is_empty() {
                    bail!("usage: load <path>");
                }
                Command::Load(PathBuf::from(rest))
            }
            "loop" => match rest {
                "on" | "1" | "true" => Command::SetLoop(true),
                "off" | "0" | "false" => Command::SetLoop(false),
                _ => bail!("usage: loop on|off"),
            },
            "" => return Err(anyhow!("empty command")),
            other => bail!("unknown command '{}'", other),
        };
        Ok(cmd)
    }
}
