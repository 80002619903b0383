//! The media element seam.
//!
//! The player never produces sound itself. It drives a [`MediaElement`]
//! supplied by the host: set its output level, point it at a
//! [`PlayableHandle`], start and stop it, and read back position. The
//! [`HeadlessMedia`] implementation keeps a virtual clock instead of an
//! output device and backs the CLI and tests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::source::PlayableHandle;

/// Media element errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    /// The element could not buffer the handle's bytes
    #[error("Media element failed to load {url}: {message}")]
    Load { url: String, message: String },

    /// Play requested with nothing loaded
    #[error("No source loaded")]
    NoSource,

    /// The element refused to start (autoplay policy and similar)
    #[error("Playback rejected: {0}")]
    Rejected(String),
}

/// A playback element the player can drive.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Output level, 0.0 - 1.0.
    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    /// True when not playing, including after the clip ended.
    fn is_paused(&self) -> bool;

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Clip length, once known.
    fn duration(&self) -> Option<Duration>;

    async fn pause(&self);

    async fn play(&self) -> Result<(), MediaError>;

    /// Point the element at new bytes and wait until it can play through.
    /// Leaves the element paused at position zero.
    async fn load(&self, handle: &PlayableHandle) -> Result<(), MediaError>;

    async fn seek(&self, position: Duration);
}

/// Ramp the output level linearly from `from` to zero.
///
/// The final step always lands on exactly zero. A zero duration still walks
/// the steps, just without sleeping.
pub async fn fade_out(media: &dyn MediaElement, from: f32, duration: Duration, steps: u32) {
    let steps = steps.max(1);
    let step_delay = duration / steps;
    for i in 1..=steps {
        let level = from * (1.0 - i as f32 / steps as f32);
        media.set_volume(level.max(0.0));
        if !step_delay.is_zero() {
            tokio::time::sleep(step_delay).await;
        }
    }
}

struct HeadlessState {
    volume: f32,
    paused: bool,
    current: Option<PlayableHandle>,
    /// Position accumulated up to `resumed_at`
    offset: Duration,
    resumed_at: Option<Instant>,
    loads: usize,
    volume_log: Vec<f32>,
}

/// Media element with a virtual clock and no audio output.
pub struct HeadlessMedia {
    state: Mutex<HeadlessState>,
    buffer_delay: Duration,
    fallback_duration: Option<Duration>,
    failing: Mutex<HashSet<String>>,
}

impl Default for HeadlessMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMedia {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                volume: 1.0,
                paused: true,
                current: None,
                offset: Duration::ZERO,
                resumed_at: None,
                loads: 0,
                volume_log: Vec::new(),
            }),
            buffer_delay: Duration::ZERO,
            fallback_duration: None,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Simulated buffering time for each load.
    pub fn with_buffer_delay(mut self, delay: Duration) -> Self {
        self.buffer_delay = delay;
        self
    }

    /// Length reported for handles whose decoder gave no duration.
    pub fn with_fallback_duration(mut self, duration: Duration) -> Self {
        self.fallback_duration = Some(duration);
        self
    }

    /// Make every load of `url` fail.
    pub fn fail_loads_for(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    /// The handle currently loaded.
    pub fn current(&self) -> Option<PlayableHandle> {
        self.state.lock().current.clone()
    }

    /// Number of successful loads.
    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    /// Every level passed to `set_volume`, oldest first.
    pub fn volume_log(&self) -> Vec<f32> {
        self.state.lock().volume_log.clone()
    }

    fn clip_length(&self, state: &HeadlessState) -> Option<Duration> {
        state
            .current
            .as_ref()
            .and_then(|h| h.duration().or(self.fallback_duration))
    }

    fn position_of(&self, state: &HeadlessState) -> Duration {
        let elapsed = state.resumed_at.map_or(Duration::ZERO, |t| t.elapsed());
        let position = state.offset + elapsed;
        match self.clip_length(state) {
            Some(length) => position.min(length),
            None => position,
        }
    }

    fn ended(&self, state: &HeadlessState) -> bool {
        match self.clip_length(state) {
            Some(length) => self.position_of(state) >= length,
            None => false,
        }
    }
}

#[async_trait]
impl MediaElement for HeadlessMedia {
    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        let mut state = self.state.lock();
        let volume = volume.clamp(0.0, 1.0);
        state.volume = volume;
        state.volume_log.push(volume);
    }

    fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.paused || self.ended(&state)
    }

    fn position(&self) -> Duration {
        let state = self.state.lock();
        self.position_of(&state)
    }

    fn duration(&self) -> Option<Duration> {
        let state = self.state.lock();
        self.clip_length(&state)
    }

    async fn pause(&self) {
        let mut state = self.state.lock();
        state.offset = self.position_of(&state);
        state.resumed_at = None;
        state.paused = true;
    }

    async fn play(&self) -> Result<(), MediaError> {
        let mut state = self.state.lock();
        if state.current.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.ended(&state) {
            state.offset = Duration::ZERO;
        }
        if state.paused {
            state.paused = false;
            state.resumed_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn load(&self, handle: &PlayableHandle) -> Result<(), MediaError> {
        {
            let mut state = self.state.lock();
            state.paused = true;
            state.resumed_at = None;
            state.offset = Duration::ZERO;
        }

        if !self.buffer_delay.is_zero() {
            tokio::time::sleep(self.buffer_delay).await;
        }

        if self.failing.lock().contains(handle.source().as_str()) {
            return Err(MediaError::Load {
                url: handle.source().to_string(),
                message: "cannot play through".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.current = Some(handle.clone());
        state.loads += 1;
        tracing::debug!(uri = %handle.uri(), "media element loaded");
        Ok(())
    }

    async fn seek(&self, position: Duration) {
        let mut state = self.state.lock();
        let position = match self.clip_length(&state) {
            Some(length) => position.min(length),
            None => position,
        };
        state.offset = position;
        if state.resumed_at.is_some() {
            state.resumed_at = Some(Instant::now());
        }
    }
}
