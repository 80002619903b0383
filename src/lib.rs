//! waveplay - an audio player that draws the waveform of what it plays.
//!
//! A [`Player`] keeps a queue of sources, fetches and decodes them through a
//! process-wide [`SourceCache`], reduces each to a 500-sample amplitude
//! vector, and renders that vector as bar geometry for a host surface. The
//! host supplies the [`MediaElement`] that actually produces sound and
//! listens to [`PlayerEvent`]s.

pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod player;
pub mod source;
#[cfg(test)]
pub mod test_utils;
pub mod waveform;

pub use config::PlayerConfig;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use player::{
    HeadlessMedia, LoadPhase, LoadRequest, MediaElement, Player, PlayerBuilder, PlayerEvent,
    PlaylistEntry, PlaylistItem, SourceState,
};
pub use source::{SourceCache, SourceDescriptor};
pub use waveform::{Bar, Resolution};
