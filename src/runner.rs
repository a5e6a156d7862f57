//! Application runner - headless host loop for the CLI binary.
//!
//! Owns the engine on the main thread. A reader thread turns stdin lines
//! into commands and sends them over a crossbeam channel; the loop applies
//! them between ticks, sleeping in `recv_timeout` until the next tick is due.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace, warn};

use crate::cli::Args;
use crate::config::PlayerConfig;
use crate::core::event_bus::EventDispatcher;
use crate::core::player::{PlaybackEngine, PlaybackState};
use crate::core::player_events::{Command, ALL_EVENTS, ENDED};
use crate::core::timer::TickQueue;
use crate::entities::pattern::PatternSource;
use crate::entities::source::DefaultOpener;
use crate::entities::surface::{shared, FrameDumpSurface, RecordingSurface, SharedSurface};
use crate::paths::{self, PathConfig};

/// One message from the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Command(Command),
    Quit,
}

/// Parse one stdin line. `None` for blank lines.
pub fn parse_control(line: &str) -> Option<Result<Control>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if matches!(line, "quit" | "exit" | "q") {
        return Some(Ok(Control::Quit));
    }
    Some(line.parse::<Command>().map(Control::Command))
}

/// Merge the config file (explicit or found in the config dir) with CLI flags
pub fn build_config(args: &Args, path_config: &PathConfig) -> Result<PlayerConfig> {
    let cli_source = match (&args.file_path, &args.pattern) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(spec)) => Some(PathBuf::from(format!("{}{}", PatternSource::SCHEME, spec))),
        (None, None) => None,
    };

    let config_path = args.config.clone().or_else(|| paths::find_player_config(path_config));
    let mut config = match (config_path, cli_source.clone()) {
        (Some(path), _) => {
            info!("Config file: {}", path.display());
            PlayerConfig::from_file(&path)?
        }
        (None, Some(source)) => PlayerConfig::new(source),
        (None, None) => bail!("Nothing to play: pass FILE, --pattern or --config"),
    };

    if let Some(source) = cli_source {
        config.source = source;
    }
    if let Some(w) = args.width {
        config.width = w;
    }
    if let Some(h) = args.height {
        config.height = h;
    }
    config.autoplay |= args.autoplay;
    config.looping |= args.loop_playback;

    config.validate()?;
    Ok(config)
}

/// Run the player with the given arguments until the stream ends or `quit`
pub fn run_app(args: Args) -> Result<()> {
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        warn!("Failed to create application directories: {:#}", e);
    }

    info!("vplay {} starting...", env!("CARGO_PKG_VERSION"));
    trace!("Command-line args: {:?}", args);

    let config = build_config(&args, &path_config)?;
    info!(
        "Source: {} ({}x{}, autoplay={}, loop={})",
        config.source.display(),
        config.width,
        config.height,
        config.autoplay,
        config.looping
    );

    let mut dump: Option<Arc<Mutex<FrameDumpSurface>>> = None;
    let surface: SharedSurface = match &args.dump_dir {
        Some(dir) => {
            let surface = FrameDumpSurface::new(dir, args.every)
                .with_context(|| format!("Failed to prepare dump directory {}", dir.display()))?;
            let (concrete, erased) = shared(surface);
            dump = Some(concrete);
            erased
        }
        None => shared(RecordingSurface::new()).1,
    };

    let events = EventDispatcher::new();
    for name in ALL_EVENTS {
        events.on(name, |event| {
            println!("{}", event);
            Ok(())
        });
    }

    let mut engine = PlaybackEngine::new(&config, Box::new(DefaultOpener), surface, TickQueue::wall(), events)
        .with_context(|| format!("Cannot start playback of {}", config.source.display()))?;

    let commands = spawn_control_reader();
    drive(&mut engine, commands)?;

    if let (Some(dump), Some(dir)) = (dump, &args.dump_dir) {
        let written = dump.lock().unwrap_or_else(|e| e.into_inner()).written();
        info!("Wrote {} frame(s) to {}", written, dir.display());
    }
    info!(
        "vplay exiting at {:.3}s of {}",
        engine.current_time(),
        engine.source().display()
    );
    Ok(())
}

/// Read stdin on a background thread, forwarding parsed controls.
/// The channel disconnects when stdin closes.
fn spawn_control_reader() -> Receiver<Control> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_control(&line) {
                None => {}
                Some(Ok(control)) => {
                    let quit = control == Control::Quit;
                    if tx.send(control).is_err() || quit {
                        break;
                    }
                }
                Some(Err(e)) => eprintln!("vplay: {:#}", e),
            }
        }
        debug!("Control reader finished");
    });
    rx
}

/// Tick/command loop.
///
/// Runs at most one tick per turn, then checks for a command, so controls
/// get through even when ticks are due back to back (paused polling on a
/// manual clock, near-zero tick delays). A manual clock is never waited on.
///
/// Returns on `quit`, when the stream ends, or when the control channel
/// closes with nothing left to drive.
pub fn drive(engine: &mut PlaybackEngine, commands: Receiver<Control>) -> Result<()> {
    let mut commands = commands;
    loop {
        engine.fire_due_tick();

        if engine.events().poll().iter().any(|e| e == ENDED) {
            info!("Stream ended");
            return Ok(());
        }

        let wait = match engine.timer().time_until_next() {
            Some(_) if engine.timer().is_manual() => Some(Duration::ZERO),
            wait => wait,
        };
        let received = match wait {
            Some(wait) => commands.recv_timeout(wait),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Control::Quit) => {
                info!("Quit requested");
                return Ok(());
            }
            Ok(Control::Command(command)) => {
                if let Err(e) = engine.apply(command) {
                    eprintln!("vplay: {}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if engine.state() != PlaybackState::Playing {
                    debug!("Controls closed while {:?}, exiting", engine.state());
                    return Ok(());
                }
                // Nothing more will arrive; keep playing to the end
                commands = crossbeam_channel::never();
            }
        }
    }
}
