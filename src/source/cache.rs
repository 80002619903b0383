//! Shared, URL-keyed cache of fetched and decoded sources.
//!
//! One cache is normally shared by every player in the process
//! ([`SourceCache::shared`]), but players take it as an injected
//! `Arc<SourceCache>` so tests and embedders can supply their own.
//!
//! Concurrent requests for the same uncached URL share a single in-flight
//! future, so the decode engine runs at most once per URL while the entry
//! stays cached. Entries are evicted least-recently-used once more than
//! `capacity` distinct URLs are held (0 disables eviction).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use reqwest::Url;

use super::fetch::{Fetch, FetchError, HttpFetcher};
use super::handle::{PlayableHandle, mime_type};
use crate::metadata;
use crate::waveform::{self, DecodeEngine, DecodeError, SAMPLE_COUNT, SymphoniaEngine};

/// Default bound on distinct cached URLs.
pub const DEFAULT_CAPACITY: usize = 64;

/// A fetched and decoded source.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: Url,
    pub handle: PlayableHandle,
    pub samples: Arc<[f32]>,
    pub sample_data_url: Option<Url>,
    pub duration: Option<Duration>,
}

/// Why a source could not be cached.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
}

impl CacheError {
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(e) => e.url(),
            Self::Decode { url, .. } => url,
        }
    }
}

type InFlight = Shared<BoxFuture<'static, Result<CacheEntry, CacheError>>>;

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used first
    order: VecDeque<String>,
    in_flight: HashMap<String, InFlight>,
}

impl CacheInner {
    fn touch(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?.clone();
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
        Some(entry)
    }
}

/// Process-wide source cache.
pub struct SourceCache {
    fetcher: Arc<dyn Fetch>,
    engine: Arc<dyn DecodeEngine>,
    capacity: usize,
    inner: Mutex<CacheInner>,
    released: AtomicUsize,
}

impl SourceCache {
    /// Create a cache over the given fetch and decode capabilities.
    pub fn new(fetcher: Arc<dyn Fetch>, engine: Arc<dyn DecodeEngine>) -> Self {
        Self {
            fetcher,
            engine,
            capacity: DEFAULT_CAPACITY,
            inner: Mutex::new(CacheInner::default()),
            released: AtomicUsize::new(0),
        }
    }

    /// Bound the number of distinct URLs held (0 = unbounded).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The cache shared by every player that wasn't given its own.
    pub fn shared() -> Arc<SourceCache> {
        static SHARED: OnceLock<Arc<SourceCache>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(SourceCache::new(
                Arc::new(HttpFetcher::new()),
                Arc::new(SymphoniaEngine),
            ))
        }))
    }

    /// Return the cached entry for `url`, fetching and decoding it on a miss.
    ///
    /// A failed request leaves nothing behind; the next call retries.
    pub async fn fetch_and_decode(
        self: &Arc<Self>,
        url: &Url,
        sample_data_url: Option<&Url>,
    ) -> Result<CacheEntry, CacheError> {
        let key = url.as_str();
        let pending = {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.touch(key) {
                tracing::debug!(%url, "source cache hit");
                return Ok(entry);
            }
            match inner.in_flight.get(key) {
                Some(pending) => {
                    tracing::debug!(%url, "joining in-flight fetch");
                    pending.clone()
                }
                None => {
                    let pending = Arc::clone(self)
                        .resolve(url.clone(), sample_data_url.cloned())
                        .boxed()
                        .shared();
                    inner.in_flight.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Cached entry without touching the network.
    pub fn get(&self, url: &Url) -> Option<CacheEntry> {
        self.inner.lock().touch(url.as_str())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.inner.lock().entries.contains_key(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles the cache has let go of through eviction or clearing.
    pub fn released_handles(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        self.released.fetch_add(count, Ordering::Relaxed);
    }

    async fn resolve(
        self: Arc<Self>,
        url: Url,
        sample_data_url: Option<Url>,
    ) -> Result<CacheEntry, CacheError> {
        let result = self.load_uncached(&url, sample_data_url).await;

        let mut inner = self.inner.lock();
        inner.in_flight.remove(url.as_str());
        if let Ok(entry) = &result {
            self.insert(&mut inner, entry.clone());
        }
        result
    }

    async fn load_uncached(
        &self,
        url: &Url,
        sample_data_url: Option<Url>,
    ) -> Result<CacheEntry, CacheError> {
        let precomputed = async {
            match &sample_data_url {
                Some(sdu) => self.fetch_precomputed(sdu).await,
                None => None,
            }
        };
        let (fetched, precomputed) = futures::join!(self.fetcher.fetch(url), precomputed);
        let fetched = fetched?;

        let extension = metadata::extension(url);
        let bytes: Arc<[u8]> = fetched.bytes.into();

        let (samples, duration) = match precomputed {
            Some(samples) => (samples, None),
            None => {
                let decoded =
                    waveform::decode(self.engine.as_ref(), Arc::clone(&bytes), extension.as_deref())
                        .await
                        .map_err(|source| CacheError::Decode {
                            url: url.to_string(),
                            source,
                        })?;
                (decoded.samples, decoded.duration)
            }
        };

        let mime = mime_type(fetched.content_type.as_deref(), extension.as_deref());
        let handle = PlayableHandle::new(url.clone(), bytes, mime, duration);
        tracing::debug!(%url, handle = handle.id(), "source decoded");

        Ok(CacheEntry {
            url: url.clone(),
            handle,
            samples,
            sample_data_url,
            duration,
        })
    }

    /// Fetch a precomputed sample vector; any problem means "decode instead".
    async fn fetch_precomputed(&self, url: &Url) -> Option<Arc<[f32]>> {
        let fetched = match self.fetcher.fetch(url).await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(%url, "precomputed samples unavailable: {}", e);
                return None;
            }
        };

        let samples: Vec<f32> = match serde_json::from_slice(&fetched.bytes) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%url, "precomputed samples malformed: {}", e);
                return None;
            }
        };

        let in_range = samples.iter().all(|s| s.is_finite() && (0.0..=1.0).contains(s));
        if samples.len() != SAMPLE_COUNT || !in_range {
            tracing::warn!(
                %url,
                len = samples.len(),
                "precomputed samples rejected, expected {} values in 0..1",
                SAMPLE_COUNT
            );
            return None;
        }

        Some(samples.into())
    }

    fn insert(&self, inner: &mut CacheInner, entry: CacheEntry) {
        let key = entry.url.as_str().to_string();
        if inner.entries.insert(key.clone(), entry).is_some() {
            // Same key, equivalent value: the earlier handle is released
            self.released.fetch_add(1, Ordering::Relaxed);
            if let Some(pos) = inner.order.iter().position(|k| *k == key) {
                inner.order.remove(pos);
            }
        }
        inner.order.push_back(key);

        while self.capacity > 0 && inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                self.released.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(url = %oldest, "evicted from source cache");
            }
        }
    }
}

impl std::fmt::Debug for SourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
