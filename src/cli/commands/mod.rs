//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `waveform`: decode one source and print its waveform
//! - `play`: play a queue of sources through a headless player
//! - `settings`: show or write the effective configuration

mod play;
mod settings;
mod waveform;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::{self, PlayerConfig};
use crate::source::{HttpFetcher, SourceCache};
use crate::waveform::SymphoniaEngine;

pub use play::cmd_play;
pub use settings::cmd_config;
pub use waveform::cmd_waveform;

/// waveplay CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "WAVEPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Decode a source and print its waveform
    Waveform {
        /// URL or path of the audio file
        url: String,
        /// Precomputed 500-sample JSON vector to use instead of decoding
        #[arg(long)]
        sample_data: Option<String>,
        /// Render at reduced resolution (100 bars)
        #[arg(long)]
        reduced: bool,
        /// Print bar geometry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play sources in order through a headless player
    Play {
        /// URLs or paths of the audio files
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Waveform {
            url,
            sample_data,
            reduced,
            json,
        } => cmd_waveform(&rt, &config, url, sample_data.as_deref(), *reduced, *json),
        Commands::Play { urls } => cmd_play(&rt, config, urls),
        Commands::Config { write } => cmd_config(&config, cli.config.as_deref(), *write),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// An explicit config path must load; the default location falls back to
/// defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<PlayerConfig> {
    match path {
        Some(path) => Ok(config::load_from(path)?),
        None => Ok(config::load()),
    }
}

/// Cache over HTTP and symphonia, bounded by the configured capacity.
fn build_cache(config: &PlayerConfig) -> Arc<SourceCache> {
    Arc::new(
        SourceCache::new(Arc::new(HttpFetcher::new()), Arc::new(SymphoniaEngine))
            .with_capacity(config.cache_capacity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_waveform() {
        let cli = Cli::try_parse_from(["waveplay", "waveform", "a.mp3", "--reduced"]).unwrap();
        match cli.command {
            Commands::Waveform {
                url, reduced, json, ..
            } => {
                assert_eq!(url, "a.mp3");
                assert!(reduced);
                assert!(!json);
            }
            _ => panic!("expected waveform command"),
        }
    }

    #[test]
    fn test_play_requires_urls() {
        assert!(Cli::try_parse_from(["waveplay", "play"]).is_err());
        let cli = Cli::try_parse_from(["waveplay", "play", "a.mp3", "b.mp3"]).unwrap();
        assert!(matches!(cli.command, Commands::Play { urls } if urls.len() == 2));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "fade_steps = 4\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().fade_steps, 4);
    }
}
