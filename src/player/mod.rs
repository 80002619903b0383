//! Waveform audio player.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Player (per host)                        │
//! │   queue, load orchestration, waveform geometry, event stream    │
//! └───────────────┬──────────────────────────────┬──────────────────┘
//!                 │ Arc<SourceCache>             │ Arc<dyn MediaElement>
//!                 ▼                              ▼
//! ┌───────────────────────────────┐  ┌──────────────────────────────┐
//! │   SourceCache (process-wide)  │  │  Media element (host-owned)  │
//! │   fetch → decode → handle     │  │  volume, play/pause, load    │
//! └───────────────────────────────┘  └──────────────┬───────────────┘
//!                                                   │ polled
//!                                    ┌──────────────┴───────────────┐
//!                                    │   Progress watcher (task)    │
//!                                    │   progress + auto-advance    │
//!                                    └──────────────────────────────┘
//! ```
//!
//! Every operation takes `&mut self`, so loads on one player never
//! interleave. Hosts observe the player through [`Player::subscribe`].

mod load;
mod media;
mod queue;
mod resolution;
mod state;
mod watcher;

pub use media::{HeadlessMedia, MediaElement, MediaError, fade_out};
pub use queue::{PlaybackQueue, PlaylistEntry, PlaylistItem, SourceRecord, SourceState};
pub use state::{LoadPhase, LoadRequest, PlayerEvent, format_duration};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{broadcast, mpsc};

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::source::{SourceCache, SourceDescriptor, resolve_url};
use crate::waveform::{Bar, Resolution};
use watcher::{AutoAdvance, PreloadResult, ProgressWatcher};

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 1024;

/// A waveform player bound to one rendering surface and media element.
pub struct Player {
    config: PlayerConfig,
    base_url: Url,
    cache: Arc<SourceCache>,
    media: Option<Arc<dyn MediaElement>>,
    queue: PlaybackQueue,
    phase: LoadPhase,
    loading: bool,
    /// Samples of the source on display
    samples: Option<Arc<[f32]>>,
    resolution: Resolution,
    bars: Vec<Bar>,
    events: broadcast::Sender<PlayerEvent>,
    watcher: Option<ProgressWatcher>,
    /// Whether auto-advance already fired for the active source
    advance_fired: Arc<AtomicBool>,
    preload_tx: mpsc::UnboundedSender<PreloadResult>,
    preload_rx: mpsc::UnboundedReceiver<PreloadResult>,
}

/// Builder for [`Player`].
#[derive(Default)]
pub struct PlayerBuilder {
    config: PlayerConfig,
    cache: Option<Arc<SourceCache>>,
    base_url: Option<Url>,
    media: Option<Arc<dyn MediaElement>>,
}

impl PlayerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific cache instead of the process-wide one.
    pub fn cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Base for relative source URLs. Overrides `base_url` in the config.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaElement>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn build(self) -> Result<Player> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => self.config.resolve_base_url()?,
        };
        let cache = self.cache.unwrap_or_else(SourceCache::shared);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (preload_tx, preload_rx) = mpsc::unbounded_channel();

        Ok(Player {
            config: self.config,
            base_url,
            cache,
            media: self.media,
            queue: PlaybackQueue::new(),
            phase: LoadPhase::Idle,
            loading: false,
            samples: None,
            resolution: Resolution::Regular,
            bars: Vec::new(),
            events,
            watcher: None,
            advance_fired: Arc::new(AtomicBool::new(false)),
            preload_tx,
            preload_rx,
        })
    }
}

impl Player {
    pub fn builder() -> PlayerBuilder {
        PlayerBuilder::default()
    }

    /// Player over the shared cache with no media element yet.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Attach (or replace) the media element.
    pub fn attach(&mut self, media: Arc<dyn MediaElement>) {
        self.watcher = None;
        self.media = Some(media);
    }

    pub fn is_attached(&self) -> bool {
        self.media.is_some()
    }

    /// Stream of player events. Slow subscribers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// The source on display.
    pub fn active(&self) -> Option<&SourceRecord> {
        self.queue.active()
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_playing(&self) -> bool {
        self.media.as_ref().is_some_and(|m| !m.is_paused())
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Geometry of the waveform on display.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Playback position as a fraction of the active clip.
    pub fn position_fraction(&self) -> f32 {
        self.media
            .as_deref()
            .map(watcher::progress)
            .unwrap_or(0.0)
    }

    /// Append sources to the queue. Fails without changes if any URL is
    /// already queued or repeated in `sources`.
    #[doc(alias = "queue")]
    pub fn enqueue(&mut self, sources: Vec<SourceDescriptor>) -> Result<()> {
        self.sync();
        let mut records = Vec::with_capacity(sources.len());
        for source in &sources {
            let url = resolve_url(&self.base_url, &source.url)?;
            let sample_data_url = match source.sample_data_url.as_deref() {
                Some(raw) => Some(resolve_url(&self.base_url, raw)?),
                None => None,
            };
            records.push(SourceRecord::new(url, sample_data_url, source.metadata.as_ref()));
        }

        let count = records.len();
        self.queue.enqueue(records)?;
        tracing::debug!(count, total = self.queue.len(), "sources queued");
        if self.watcher.is_some() {
            // A new source may now be the auto-advance target
            self.restart_watcher();
        }
        Ok(())
    }

    /// Remove a source from the queue.
    pub fn dequeue(&mut self, url: &str) -> Result<SourceRecord> {
        self.sync();
        let url = resolve_url(&self.base_url, url)?;
        let record = self.queue.dequeue(&url)?;
        if self.watcher.is_some() {
            // The auto-advance target may have been this record
            self.restart_watcher();
        }
        Ok(record)
    }

    /// Snapshot of the queue.
    #[doc(alias = "get_playlist")]
    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        self.queue.playlist()
    }

    /// Fold finished background preloads into the queue.
    ///
    /// Called at the start of every operation; hosts that only listen to
    /// events can call it directly.
    pub fn sync(&mut self) {
        while let Ok(result) = self.preload_rx.try_recv() {
            match result {
                Ok(entry) => {
                    if let Some(record) = self.queue.find_mut(&entry.url)
                        && record.state == SourceState::Queued
                    {
                        record.attach(&entry);
                        record.state = SourceState::Loaded;
                        tracing::debug!(url = %entry.url, "auto-advance preload applied");
                        self.emit(PlayerEvent::Preloaded(entry.url.clone()));
                    }
                }
                Err(e) => tracing::debug!("dropping failed auto-advance preload: {}", e),
            }
        }

        let ended = self.media.as_ref().is_some_and(|m| m.is_paused());
        if self.phase == LoadPhase::Playing && ended {
            self.watcher = None;
            self.set_phase(LoadPhase::Idle);
        }
    }

    /// Resume playback of the active source.
    pub async fn play(&mut self) -> Result<()> {
        self.sync();
        let media = self.media()?;
        if self.queue.active().is_none() {
            return Err(Error::NotFound("no active source to play".to_string()));
        }
        media.play().await?;
        self.set_phase(LoadPhase::Playing);
        self.emit(PlayerEvent::Playing(true));
        self.restart_watcher();
        Ok(())
    }

    /// Pause playback immediately, without a fade.
    pub async fn pause(&mut self) -> Result<()> {
        self.sync();
        let media = self.media()?;
        media.pause().await;
        self.watcher = None;
        if self.phase == LoadPhase::Playing {
            self.set_phase(LoadPhase::Idle);
        }
        self.emit(PlayerEvent::Playing(false));
        self.emit(PlayerEvent::Progress(watcher::progress(media.as_ref())));
        Ok(())
    }

    /// Toggle play/pause. Ignored while a load is in progress.
    pub async fn toggle(&mut self) -> Result<()> {
        if self.loading {
            return Ok(());
        }
        if self.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Seek to a position (0.0 - 1.0).
    pub async fn seek(&mut self, fraction: f32) -> Result<()> {
        self.sync();
        let media = self.media()?;
        let fraction = fraction.clamp(0.0, 1.0);
        if let Some(duration) = media.duration() {
            media.seek(duration.mul_f32(fraction)).await;
        }
        self.emit(PlayerEvent::Progress(watcher::progress(media.as_ref())));
        Ok(())
    }

    /// Jump by `seconds` (negative to rewind). Running off either end of the
    /// clip pauses there.
    pub async fn skip(&mut self, seconds: f64) -> Result<()> {
        self.sync();
        let media = self.media()?;
        let Some(duration) = media.duration() else {
            return Ok(());
        };

        let target = media.position().as_secs_f64() + seconds;
        if target <= 0.0 {
            media.seek(Duration::ZERO).await;
            self.pause().await
        } else if target >= duration.as_secs_f64() {
            media.seek(duration).await;
            self.pause().await
        } else {
            media.seek(Duration::from_secs_f64(target)).await;
            self.emit(PlayerEvent::Progress(watcher::progress(media.as_ref())));
            Ok(())
        }
    }

    fn media(&self) -> Result<Arc<dyn MediaElement>> {
        self.media.clone().ok_or(Error::NotReady)
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_phase(&mut self, phase: LoadPhase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "load phase");
            self.phase = phase;
            self.emit(PlayerEvent::Phase(phase));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.emit(PlayerEvent::Loading(loading));
        }
    }

    /// (Re)start progress polling for the active source, if it is playing.
    fn restart_watcher(&mut self) {
        self.watcher = None;
        let Some(media) = self.media.clone() else {
            return;
        };
        if media.is_paused() {
            return;
        }

        let next = self
            .queue
            .next_queued_index()
            .and_then(|i| self.queue.get(i))
            .map(|r| (r.url.clone(), r.sample_data_url.clone()));
        let auto_advance = AutoAdvance {
            fired: Arc::clone(&self.advance_fired),
            threshold: self.config.auto_advance_remaining(),
            next,
            cache: Arc::clone(&self.cache),
            results: self.preload_tx.clone(),
        };
        self.watcher = Some(ProgressWatcher::spawn(
            media,
            self.events.clone(),
            self.config.progress_interval(),
            auto_advance,
        ));
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("base_url", &self.base_url.as_str())
            .field("queue", &self.queue.len())
            .field("phase", &self.phase)
            .field("loading", &self.loading)
            .field("resolution", &self.resolution)
            .finish()
    }
}
