//! Load phases, player events and load requests.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::SourceMetadata;
use crate::source::{SourceDescriptor, resolve_url};
use crate::waveform::{Bar, Resolution};

/// Where the load orchestrator currently is.
///
/// ```text
/// Idle → FadingOut → Paused → Resolving → (Fetching | CacheHit) → Swapped
///      → BufferingPlayable → Presented → (Playing | Idle)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadPhase {
    #[default]
    Idle,
    FadingOut,
    Paused,
    Resolving,
    Fetching,
    CacheHit,
    Swapped,
    BufferingPlayable,
    Presented,
    Playing,
}

/// Updates for the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Loading indicator on or off
    Loading(bool),
    /// Orchestrator phase transition
    Phase(LoadPhase),
    /// New waveform geometry
    Waveform {
        resolution: Resolution,
        bars: Vec<Bar>,
    },
    /// Derived style variables for the current resolution
    Style { sample_count: usize, stroke_width: f32 },
    /// Display metadata of the active source
    Metadata {
        title: String,
        creator: Option<String>,
    },
    /// Playing flag changed
    Playing(bool),
    /// Playback position as a fraction (0.0 - 1.0)
    Progress(f32),
    /// A queued source was decoded ahead of time
    Preloaded(Url),
    /// A source finished loading and is on display
    Presented(Url),
}

/// Arguments for `load` and `preload`. All fields optional: with no URL the
/// player advances within its queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadRequest {
    pub url: Option<String>,
    pub sample_data_url: Option<String>,
    pub metadata: Option<SourceMetadata>,
}

impl LoadRequest {
    /// Advance within the queue.
    pub fn next() -> Self {
        Self::default()
    }

    /// Target a specific URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub(crate) fn resolve(&self, base: &Url) -> Result<LoadTarget> {
        let url = match self.url.as_deref() {
            Some(raw) => Some(resolve_url(base, raw)?),
            None => None,
        };
        let sample_data_url = match self.sample_data_url.as_deref() {
            Some(raw) => Some(resolve_url(base, raw)?),
            None => None,
        };
        Ok(LoadTarget {
            url,
            sample_data_url,
            metadata: self.metadata.clone(),
        })
    }
}

impl From<SourceDescriptor> for LoadRequest {
    fn from(d: SourceDescriptor) -> Self {
        Self {
            url: Some(d.url),
            sample_data_url: d.sample_data_url,
            metadata: d.metadata,
        }
    }
}

/// A load request with its URLs resolved.
#[derive(Debug, Clone)]
pub(crate) struct LoadTarget {
    pub url: Option<Url>,
    pub sample_data_url: Option<Url>,
    pub metadata: Option<SourceMetadata>,
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
