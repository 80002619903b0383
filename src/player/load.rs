//! Load orchestration: fade, resolve, swap, buffer, present.
//!
//! A load either completes or leaves the queue exactly as it found it. On
//! failure the previous source keeps playing if it was playing before.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use reqwest::Url;

use super::media::{MediaElement, fade_out};
use super::queue::{PlaybackQueue, PlaylistItem, SourceRecord, SourceState};
use super::state::{LoadPhase, LoadRequest, LoadTarget, PlayerEvent};
use super::Player;
use crate::error::{Error, Result};
use crate::metadata::TrackInfo;
use crate::source::{CacheEntry, PlayableHandle, resolve_url};
use crate::waveform::Bar;

/// What a failed load restores.
struct Snapshot {
    queue: PlaybackQueue,
    samples: Option<Arc<[f32]>>,
    bars: Vec<Bar>,
    handle: Option<PlayableHandle>,
    position: Duration,
}

impl Player {
    /// Present a source: the given URL, or the next one in the queue.
    ///
    /// Fades out an audible source first and resumes playback afterwards if
    /// it was playing.
    pub async fn load(&mut self, request: LoadRequest) -> Result<()> {
        self.sync();
        let media = self.media()?;
        let target = request.resolve(&self.base_url)?;

        let snapshot = Snapshot {
            queue: self.queue.clone(),
            samples: self.samples.clone(),
            bars: self.bars.clone(),
            handle: self.queue.active().and_then(|r| r.handle.clone()),
            position: media.position(),
        };

        self.set_loading(true);
        self.watcher = None;

        let volume = media.volume();
        let was_playing = !media.is_paused();
        if was_playing {
            self.set_phase(LoadPhase::FadingOut);
            fade_out(
                media.as_ref(),
                volume,
                self.config.fade_duration(),
                self.config.fade_steps,
            )
            .await;
            media.pause().await;
            self.emit(PlayerEvent::Playing(false));
        }
        self.set_phase(LoadPhase::Paused);

        let url = match self.swap(media.as_ref(), target).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("load failed: {}", e);
                self.roll_back(media.as_ref(), snapshot, volume, was_playing)
                    .await;
                return Err(e);
            }
        };

        media.set_volume(volume);
        self.advance_fired = Arc::new(AtomicBool::new(false));
        if was_playing {
            match media.play().await {
                Ok(()) => self.emit(PlayerEvent::Playing(true)),
                Err(e) => tracing::warn!(%url, "could not resume playback: {}", e),
            }
        }
        self.set_loading(false);
        self.set_phase(LoadPhase::Presented);

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        tracing::info!(%url, "source presented");
        self.emit(PlayerEvent::Presented(url));

        if media.is_paused() {
            self.set_phase(LoadPhase::Idle);
        } else {
            self.set_phase(LoadPhase::Playing);
            self.restart_watcher();
        }
        Ok(())
    }

    /// Decode a source ahead of time without presenting it.
    ///
    /// With no URL, preloads the first queued source after the active one.
    pub async fn preload(&mut self, request: LoadRequest) -> Result<()> {
        self.sync();
        let target = request.resolve(&self.base_url)?;

        let (url, index) = match target.url {
            Some(url) => {
                let index = self.queue.position(&url);
                (url, index)
            }
            None => {
                let index = self.queue.next_queued_index().ok_or_else(|| {
                    Error::NotFound("no queued source to preload".to_string())
                })?;
                (self.queue.records()[index].url.clone(), Some(index))
            }
        };

        match index {
            Some(index) => {
                self.ensure_resolved(index, false).await?;
                if let Some(record) = self.queue.get_mut(index)
                    && record.state == SourceState::Queued
                {
                    record.state = SourceState::Loaded;
                }
            }
            None => {
                let entry = self
                    .fetch(&url, target.sample_data_url.as_ref(), false)
                    .await?;
                let mut record =
                    SourceRecord::new(url.clone(), target.sample_data_url, target.metadata.as_ref());
                record.attach(&entry);
                record.state = SourceState::Loaded;
                self.queue.push(record);
            }
        }

        tracing::debug!(%url, "source preloaded");
        self.emit(PlayerEvent::Preloaded(url));
        if self.watcher.is_some() {
            self.restart_watcher();
        }
        Ok(())
    }

    /// Replace the whole queue.
    ///
    /// The active source must keep its URL and stay active. Entries marked
    /// loaded are decoded before the swap, so a failure leaves the queue
    /// unchanged.
    pub async fn set_playlist(&mut self, items: Vec<PlaylistItem>) -> Result<()> {
        self.sync();
        if items.is_empty() {
            return Err(Error::invalid("playlist is empty"));
        }

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let raw = item
                .url
                .as_deref()
                .ok_or_else(|| Error::invalid("playlist entry has no URL"))?;
            let url = resolve_url(&self.base_url, raw)?;
            if !seen.insert(url.clone()) {
                return Err(Error::DuplicateSource(url.to_string()));
            }
            let sample_data_url = match item.sample_data_url.as_deref() {
                Some(raw) => Some(resolve_url(&self.base_url, raw)?),
                None => None,
            };
            records.push(self.playlist_record(url, sample_data_url, item));
        }

        self.queue.validate_replacement(&records)?;

        for record in records
            .iter_mut()
            .filter(|r| r.state == SourceState::Loaded && !r.is_resolved())
        {
            let entry = self
                .fetch(&record.url, record.sample_data_url.as_ref(), false)
                .await?;
            record.attach(&entry);
        }

        tracing::debug!(count = records.len(), "playlist replaced");
        self.queue.replace(records);
        if self.watcher.is_some() {
            self.restart_watcher();
        }
        Ok(())
    }

    /// Build the record for a playlist entry, reusing known data.
    fn playlist_record(
        &self,
        url: Url,
        sample_data_url: Option<Url>,
        item: PlaylistItem,
    ) -> SourceRecord {
        let mut record = match self.queue.find(&url) {
            // Only the marking of the active record may differ, and
            // validation rejects that
            Some(existing) if existing.state == SourceState::Active => {
                let mut record = existing.clone();
                record.state = item.state;
                return record;
            }
            Some(existing) => {
                let mut record = existing.clone();
                if sample_data_url.is_some() {
                    record.sample_data_url = sample_data_url;
                }
                if item.metadata.is_some() {
                    record.info = TrackInfo::resolve(&url, item.metadata.as_ref());
                }
                record
            }
            None => SourceRecord::new(url, sample_data_url, item.metadata.as_ref()),
        };
        record.state = item.state;

        if !record.is_resolved()
            && let Some(entry) = self.cache.get(&record.url)
        {
            record.attach(&entry);
        }
        record
    }

    /// Resolve the target and swap it in as the active source.
    async fn swap(&mut self, media: &dyn MediaElement, target: LoadTarget) -> Result<Url> {
        self.set_phase(LoadPhase::Resolving);
        let index = self.resolve_target(target).await?;
        self.queue.activate(index);

        let record = &self.queue.records()[index];
        let url = record.url.clone();
        let (Some(handle), Some(samples)) = (record.handle.clone(), record.samples.clone()) else {
            return Err(Error::decode_failure(url.as_str(), "source has no decoded data"));
        };
        let metadata = PlayerEvent::Metadata {
            title: record.title().to_string(),
            creator: record.creator().map(str::to_string),
        };

        self.set_phase(LoadPhase::Swapped);
        self.show_samples(Some(samples));
        self.emit(metadata);

        self.set_phase(LoadPhase::BufferingPlayable);
        media.load(&handle).await?;
        Ok(url)
    }

    /// Index of the record to present, inserting it at the head if new.
    async fn resolve_target(&mut self, target: LoadTarget) -> Result<usize> {
        let Some(url) = target.url else {
            let index = self.queue.next_index()?;
            self.ensure_resolved(index, true).await?;
            return Ok(index);
        };

        if let Some(index) = self.queue.position(&url) {
            self.ensure_resolved(index, true).await?;
            return Ok(index);
        }

        let entry = self
            .fetch(&url, target.sample_data_url.as_ref(), true)
            .await?;
        let mut record = SourceRecord::new(url, target.sample_data_url, target.metadata.as_ref());
        record.attach(&entry);
        self.queue.insert_front(record);
        Ok(0)
    }

    /// Make sure the record at `index` has samples and a handle.
    async fn ensure_resolved(&mut self, index: usize, track_phase: bool) -> Result<()> {
        let Some(record) = self.queue.get(index) else {
            return Err(Error::NotFound(format!("queue index {}", index)));
        };
        let (resolved, url, sample_data_url) = (
            record.is_resolved(),
            record.url.clone(),
            record.sample_data_url.clone(),
        );
        if resolved {
            if track_phase {
                self.set_phase(LoadPhase::CacheHit);
            }
            return Ok(());
        }

        let entry = self
            .fetch(&url, sample_data_url.as_ref(), track_phase)
            .await?;
        if let Some(record) = self.queue.get_mut(index) {
            record.attach(&entry);
        }
        Ok(())
    }

    /// Go through the shared cache, reporting hit or fetch when loading.
    async fn fetch(
        &mut self,
        url: &Url,
        sample_data_url: Option<&Url>,
        track_phase: bool,
    ) -> Result<CacheEntry> {
        if track_phase {
            let phase = if self.cache.contains(url) {
                LoadPhase::CacheHit
            } else {
                LoadPhase::Fetching
            };
            self.set_phase(phase);
        }
        Ok(self.cache.fetch_and_decode(url, sample_data_url).await?)
    }

    async fn roll_back(
        &mut self,
        media: &dyn MediaElement,
        snapshot: Snapshot,
        volume: f32,
        was_playing: bool,
    ) {
        let media_touched = self.phase == LoadPhase::BufferingPlayable;
        self.queue = snapshot.queue;
        if media_touched {
            self.show_samples(snapshot.samples);
            if let Some(handle) = &snapshot.handle {
                match media.load(handle).await {
                    Ok(()) => media.seek(snapshot.position).await,
                    Err(e) => tracing::warn!("could not restore previous source: {}", e),
                }
            }
        } else {
            self.samples = snapshot.samples;
            self.bars = snapshot.bars;
        }

        media.set_volume(volume);
        let mut resumed = false;
        if was_playing && snapshot.handle.is_some() {
            match media.play().await {
                Ok(()) => {
                    resumed = true;
                    self.emit(PlayerEvent::Playing(true));
                }
                Err(e) => tracing::warn!("could not resume previous source: {}", e),
            }
        }

        self.set_loading(false);
        if resumed {
            self.set_phase(LoadPhase::Playing);
            self.restart_watcher();
        } else {
            self.set_phase(LoadPhase::Idle);
        }
    }
}
