//! Command-line interface for waveplay.
//!
//! This module provides CLI commands for rendering waveforms, playing queues
//! through a headless player, and inspecting configuration.

mod commands;

pub use commands::{Cli, Commands, run_command};
