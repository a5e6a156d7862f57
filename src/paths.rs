//! Config and log file locations
//!
//! Priority (first match wins):
//! 1. `--config-dir` CLI argument
//! 2. `VPLAY_CONFIG_DIR` environment variable
//! 3. Current directory, if it already holds `vplay.json` or `vplay.log`
//! 4. Platform directory from dirs-next (`~/.config/vplay`, `~/.local/share/vplay`, ...)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE_NAME;

pub const CONFIG_DIR_ENV: &str = "VPLAY_CONFIG_DIR";
pub const LOG_FILE_NAME: &str = "vplay.log";

const APP_DIR: &str = "vplay";

/// Overrides for the default locations
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI argument first, then `VPLAY_CONFIG_DIR`
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Config,
    Data,
}

/// Path of a configuration file
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, Kind::Config).join(name)
}

/// Path of a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, Kind::Data).join(name)
}

/// `vplay.json` in the config directory, if one exists
pub fn find_player_config(config: &PathConfig) -> Option<PathBuf> {
    let path = config_file(CONFIG_FILE_NAME, config);
    path.is_file().then_some(path)
}

/// Create the config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, Kind::Config);
    let data_dir = resolve_dir(config, Kind::Data);

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    if data_dir != config_dir {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [CONFIG_FILE_NAME, LOG_FILE_NAME].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, kind: Kind) -> PathBuf {
    let platform = match kind {
        Kind::Config => dirs_next::config_dir(),
        Kind::Data => dirs_next::data_dir(),
    };
    pick_dir(config, std::env::current_dir().ok().as_deref(), platform)
}

fn pick_dir(config: &PathConfig, cwd: Option<&Path>, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(cwd) = cwd.filter(|d| has_local_files(d)) {
        return cwd.to_path_buf();
    }
    platform.map(|d| d.join(APP_DIR)).unwrap_or_else(|| PathBuf::from("."))
}
