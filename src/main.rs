//! waveplay - waveform audio player.
//!
//! Renders waveforms of audio files and plays queues of them through a
//! headless player from the command line.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use waveplay::cli;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("waveplay=info".parse()?))
        .init();

    cli::run_command(&args)
}
