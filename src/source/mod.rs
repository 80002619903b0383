//! Sources: host descriptors, fetching, playable handles and the shared cache.
//!
//! # Design Principles
//!
//! - **Fetch once**: a URL is fetched and decoded at most once per cache
//!   lifetime, however many players ask for it
//! - **All or nothing**: failures never leave partial entries behind
//! - **Graceful degradation**: a missing precomputed sample file just means
//!   the audio gets decoded instead

mod cache;
mod fetch;
mod handle;

pub use cache::{CacheEntry, CacheError, SourceCache};
pub use fetch::{Fetch, FetchError, Fetched, HttpFetcher};
pub use handle::PlayableHandle;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::SourceMetadata;

/// A track as described by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Absolute or base-relative URL of the audio file
    pub url: String,
    /// Optional URL of a precomputed 500-sample JSON vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SourceMetadata>,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_sample_data(mut self, url: impl Into<String>) -> Self {
        self.sample_data_url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Resolve a host-supplied URL string against a base into its canonical form.
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::invalid("source URL is empty"));
    }
    base.join(raw)
        .map_err(|e| Error::invalid(format!("cannot resolve {:?}: {}", raw, e)))
}
