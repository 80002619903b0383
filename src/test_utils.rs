//! Test utilities and fakes for waveplay tests.
//!
//! Provides an in-memory fetcher, a decode engine for synthetic clips, and
//! a fully wired player rig over a headless media element.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::rig;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let mut rig = rig(&[("a.mp3", 20), ("b.mp3", 20)]);
//!     rig.player.enqueue(descriptors(&["a.mp3", "b.mp3"])).unwrap();
//!     rig.player.load(LoadRequest::next()).await.unwrap();
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::broadcast;

use crate::config::PlayerConfig;
use crate::player::{HeadlessMedia, Player, PlayerEvent};
use crate::source::{Fetch, FetchError, Fetched, SourceCache, SourceDescriptor};
use crate::waveform::{DecodeEngine, DecodeError, DecodedChannel, SAMPLE_COUNT};

/// Base URL relative sources resolve against in rigs.
pub const BASE: &str = "https://example.com/music/";

/// Parse a URL, panicking on malformed input.
pub fn url(s: &str) -> Url {
    Url::parse(s).expect("valid test URL")
}

/// Absolute URL of a rig source.
pub fn rig_url(name: &str) -> Url {
    url(BASE).join(name).expect("valid test path")
}

/// Bytes [`ClipEngine`] decodes into a clip of `seconds` length.
pub fn clip_bytes(seconds: u8) -> Vec<u8> {
    vec![b'W', seconds]
}

/// JSON for a precomputed sample vector of constant `value`.
pub fn precomputed_json(value: f32) -> Vec<u8> {
    serde_json::to_vec(&vec![value; SAMPLE_COUNT]).expect("serializable")
}

/// Descriptors for rig sources.
pub fn descriptors(names: &[&str]) -> Vec<SourceDescriptor> {
    names.iter().map(|n| SourceDescriptor::new(*n)).collect()
}

/// In-memory fetcher. Unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
    counts: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }

    /// Delay every response, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().insert(url.to_string(), bytes);
    }

    pub fn remove(&self, url: &str) {
        self.files.lock().remove(url);
    }

    /// How many times `url` was requested.
    pub fn fetch_count(&self, url: &Url) -> usize {
        self.counts.lock().get(url.as_str()).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetch for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        *self.counts.lock().entry(url.to_string()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let bytes = self.files.lock().get(url.as_str()).cloned();
        match bytes {
            Some(bytes) => Ok(Fetched {
                bytes,
                content_type: None,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Decodes [`clip_bytes`] into a 1 kHz sawtooth of the encoded length.
#[derive(Default)]
pub struct ClipEngine {
    calls: AtomicUsize,
}

impl ClipEngine {
    pub const SAMPLE_RATE: u32 = 1000;

    /// Number of decode calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecodeEngine for ClipEngine {
    async fn decode_channel(
        &self,
        bytes: Arc<[u8]>,
        _extension: Option<&str>,
    ) -> Result<DecodedChannel, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &bytes[..] {
            [b'W', seconds] => {
                let len = *seconds as usize * Self::SAMPLE_RATE as usize;
                let samples = (0..len).map(|i| (i % 100) as f32 / 100.0 - 0.5).collect();
                Ok(DecodedChannel {
                    samples,
                    sample_rate: Some(Self::SAMPLE_RATE),
                })
            }
            _ => Err(DecodeError::UnsupportedFormat(
                "not a synthetic clip".to_string(),
            )),
        }
    }
}

/// A player wired to in-memory fakes.
pub struct Rig {
    pub player: Player,
    pub media: Arc<HeadlessMedia>,
    pub cache: Arc<SourceCache>,
    pub fetcher: Arc<MemoryFetcher>,
    pub engine: Arc<ClipEngine>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

impl Rig {
    /// Every event emitted since the last drain.
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Rig with instant fades, serving `(name, seconds)` clips under [`BASE`].
pub fn rig(files: &[(&str, u8)]) -> Rig {
    rig_with(files, PlayerConfig::instant())
}

pub fn rig_with(files: &[(&str, u8)], config: PlayerConfig) -> Rig {
    rig_with_media(files, config, HeadlessMedia::new())
}

pub fn rig_with_media(files: &[(&str, u8)], config: PlayerConfig, media: HeadlessMedia) -> Rig {
    let fetcher = Arc::new(MemoryFetcher::new());
    for (name, seconds) in files {
        fetcher.insert(rig_url(name).as_str(), clip_bytes(*seconds));
    }
    let engine = Arc::new(ClipEngine::default());
    let cache = Arc::new(SourceCache::new(fetcher.clone(), engine.clone()));
    let media = Arc::new(media);

    let player = Player::builder()
        .config(config)
        .cache(Arc::clone(&cache))
        .base_url(url(BASE))
        .media(media.clone())
        .build()
        .expect("valid rig");
    let events = player.subscribe();

    Rig {
        player,
        media,
        cache,
        fetcher,
        engine,
        events,
    }
}
