//! Surface width tracking and waveform geometry.

use std::sync::Arc;

use super::Player;
use super::state::PlayerEvent;
use crate::waveform::{self, Resolution};

impl Player {
    /// Report the rendering surface width.
    ///
    /// Crossing the narrow threshold switches resolution and re-renders the
    /// waveform on display. Returns whether the resolution changed.
    pub fn resize(&mut self, width: f32) -> bool {
        let resolution = Resolution::for_width(width, self.config.narrow_threshold);
        if resolution == self.resolution {
            return false;
        }

        tracing::debug!(width, ?resolution, "resolution changed");
        self.resolution = resolution;
        self.emit(PlayerEvent::Style {
            sample_count: resolution.sample_count(),
            stroke_width: resolution.stroke_width(),
        });
        if self.samples.is_some() {
            self.render();
        }
        true
    }

    /// Put `samples` on display at the current resolution.
    pub(super) fn show_samples(&mut self, samples: Option<Arc<[f32]>>) {
        self.samples = samples;
        self.emit(PlayerEvent::Style {
            sample_count: self.resolution.sample_count(),
            stroke_width: self.resolution.stroke_width(),
        });
        self.render();
    }

    fn render(&mut self) {
        self.bars = match &self.samples {
            Some(samples) => waveform::render(samples, self.resolution),
            None => Vec::new(),
        };
        self.emit(PlayerEvent::Waveform {
            resolution: self.resolution,
            bars: self.bars.clone(),
        });
    }
}
