//! Progress polling and auto-advance.
//!
//! While a source plays, a background task polls the media element, emits
//! [`PlayerEvent::Progress`], and once playback nears the end (or the clip
//! is short to begin with) preloads the next queued source into the cache.
//! The preload result travels back over a channel; the player folds it into
//! its queue on its next operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::media::MediaElement;
use super::state::PlayerEvent;
use crate::source::{CacheEntry, CacheError, SourceCache};

pub(crate) type PreloadResult = Result<CacheEntry, CacheError>;

/// Playback position as a fraction of the clip length.
pub(crate) fn progress(media: &dyn MediaElement) -> f32 {
    match media.duration() {
        Some(d) if !d.is_zero() => (media.position().as_secs_f64() / d.as_secs_f64()).min(1.0) as f32,
        _ => 0.0,
    }
}

/// One-shot preload of the next queued source.
pub(crate) struct AutoAdvance {
    /// Shared with the player; reset when a new source becomes active
    pub fired: Arc<AtomicBool>,
    pub threshold: Duration,
    pub next: Option<(Url, Option<Url>)>,
    pub cache: Arc<SourceCache>,
    pub results: mpsc::UnboundedSender<PreloadResult>,
}

impl AutoAdvance {
    fn due(&self, position: Duration, duration: Duration) -> bool {
        duration < self.threshold || duration.saturating_sub(position) < self.threshold
    }

    fn fire(&self) {
        // Nothing queued yet; the player re-arms the watcher on enqueue
        let Some((url, sample_data_url)) = self.next.clone() else {
            return;
        };
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::debug!(%url, "auto-advance: preloading next source");
        let cache = Arc::clone(&self.cache);
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = cache.fetch_and_decode(&url, sample_data_url.as_ref()).await;
            if let Err(e) = &result {
                tracing::warn!(%url, "auto-advance preload failed: {}", e);
            }
            // Receiver gone means the player was dropped
            let _ = results.send(result);
        });
    }
}

/// Handle to the polling task. Dropping it stops polling.
pub(crate) struct ProgressWatcher {
    task: JoinHandle<()>,
}

impl ProgressWatcher {
    pub fn spawn(
        media: Arc<dyn MediaElement>,
        events: broadcast::Sender<PlayerEvent>,
        interval: Duration,
        auto_advance: AutoAdvance,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let _ = events.send(PlayerEvent::Progress(progress(media.as_ref())));

                if let Some(duration) = media.duration()
                    && auto_advance.due(media.position(), duration)
                {
                    auto_advance.fire();
                }

                if media.is_paused() {
                    tracing::debug!("playback stopped, progress watcher exiting");
                    let _ = events.send(PlayerEvent::Playing(false));
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ProgressWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
