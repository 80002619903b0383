//! Player configuration stored as TOML.
//!
//! The default location is the OS-standard config directory:
//! - Windows: %APPDATA%\waveplay\config.toml
//! - macOS: ~/Library/Application Support/waveplay/config.toml
//! - Linux: ~/.config/waveplay/config.toml
//!
//! Every field has a default, so a partial file (or no file at all) still
//! yields a usable configuration.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for a player and its shared cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Fade-out length before pausing an audible source
    pub fade_duration_ms: u64,

    /// Discrete volume steps in the fade-out
    pub fade_steps: u32,

    /// Delay after presenting a source before the load completes
    pub settle_delay_ms: u64,

    /// Surface widths below this render at reduced resolution
    pub narrow_threshold: f32,

    /// Preload the next source once this many seconds remain
    pub auto_advance_remaining_secs: f64,

    /// Playback position polling interval
    pub progress_interval_ms: u64,

    /// Maximum distinct URLs kept in the source cache (0 = unbounded)
    pub cache_capacity: usize,

    /// Base against which relative source URLs are resolved
    pub base_url: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 300,
            fade_steps: 100,
            settle_delay_ms: 300,
            narrow_threshold: 600.0,
            auto_advance_remaining_secs: 15.0,
            progress_interval_ms: 50,
            cache_capacity: 64,
            base_url: None,
        }
    }
}

impl PlayerConfig {
    /// Config with every delay zeroed, for tests and scripted playback.
    pub fn instant() -> Self {
        Self {
            fade_duration_ms: 0,
            settle_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn auto_advance_remaining(&self) -> Duration {
        Duration::from_secs_f64(self.auto_advance_remaining_secs.max(0.0))
    }

    /// Base for relative source URLs: the configured one, else the working
    /// directory as a `file://` URL.
    pub fn resolve_base_url(&self) -> Result<Url, ConfigError> {
        if let Some(raw) = &self.base_url {
            return Url::parse(raw).map_err(|e| ConfigError::BaseUrl(raw.clone(), e.to_string()));
        }
        let cwd = std::env::current_dir()
            .ok()
            .and_then(|dir| Url::from_directory_path(dir).ok());
        match cwd {
            Some(url) => Ok(url),
            None => Url::parse("file:///")
                .map_err(|e| ConfigError::BaseUrl("file:///".to_string(), e.to_string())),
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("waveplay"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns the default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail.
pub fn load() -> PlayerConfig {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return PlayerConfig::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return PlayerConfig::default();
    }

    match load_from(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::error!("{}", e);
            tracing::warn!("Using default configuration");
            PlayerConfig::default()
        }
    }
}

/// Load configuration from an explicit path, failing on read or parse errors.
pub fn load_from(path: &Path) -> Result<PlayerConfig, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    PlayerConfig::from_toml(&contents)
}

/// Save configuration to a path.
///
/// Creates the parent directory if needed and writes atomically.
pub fn save(config: &PlayerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(toml::de::Error),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Invalid base URL {0}: {1}")]
    BaseUrl(String, String),
}

// ============================================================================
// Tests
// ============================================================================
