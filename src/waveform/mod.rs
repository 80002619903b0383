//! Sample-data pipeline: decoded channel → normalized amplitudes → bar geometry.
//!
//! ```text
//! raw bytes ──DecodeEngine──▶ channel 0 (f32 per sample)
//!                                │ reduce: 500 blocks, |Σ|x|| / 500, peak-normalize
//!                                ▼
//!                        500 amplitudes in 0..1
//!                                │ render(Regular | Reduced)
//!                                ▼
//!                  Vec<Bar { position, height }> (0..100)
//! ```
//!
//! Rendering is pure; the host draws the bars.

mod engine;

pub use engine::{
    CallbackDecodeEngine, CallbackEngine, DecodeCallback, DecodeEngine, DecodeError,
    DecodedChannel, SymphoniaEngine,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Length of every sample vector.
pub const SAMPLE_COUNT: usize = 500;

/// Bar count in reduced resolution.
pub const REDUCED_SAMPLE_COUNT: usize = 100;

/// Samples below this render as a 1% stub so silence stays visible.
const SILENCE_FLOOR: f32 = 0.05;

/// Waveform resolution for a rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// One bar per sample
    #[default]
    Regular,
    /// Every fifth sample, for narrow surfaces
    Reduced,
}

impl Resolution {
    /// Pick the resolution for a surface width.
    pub fn for_width(width: f32, narrow_threshold: f32) -> Self {
        if width < narrow_threshold {
            Self::Reduced
        } else {
            Self::Regular
        }
    }

    /// Number of bars rendered at this resolution.
    pub fn sample_count(self) -> usize {
        match self {
            Self::Regular => SAMPLE_COUNT,
            Self::Reduced => REDUCED_SAMPLE_COUNT,
        }
    }

    /// Bar stroke width as a percentage of the surface.
    pub fn stroke_width(self) -> f32 {
        100.0 / self.sample_count() as f32
    }
}

/// One waveform bar, both fields in percent of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Horizontal center
    pub position: f32,
    /// Height
    pub height: f32,
}

/// Output of the decode step: the normalized vector plus what the decoder
/// learned about the clip.
#[derive(Debug, Clone)]
pub struct DecodedWaveform {
    pub samples: Arc<[f32]>,
    pub duration: Option<Duration>,
}

/// Decode raw bytes and reduce channel 0 to [`SAMPLE_COUNT`] amplitudes.
pub async fn decode(
    engine: &dyn DecodeEngine,
    bytes: Arc<[u8]>,
    extension: Option<&str>,
) -> Result<DecodedWaveform, DecodeError> {
    let channel = engine.decode_channel(bytes, extension).await?;
    let duration = channel.duration();
    let samples = reduce(&channel.samples)?;

    Ok(DecodedWaveform {
        samples: samples.into(),
        duration,
    })
}

/// Reduce a channel to [`SAMPLE_COUNT`] peak-normalized block amplitudes.
///
/// Block size is `floor(len / 500)`; the trailing remainder is dropped. Each
/// block sums absolute values and divides by the fixed sample count rather
/// than the block length, which shapes the dynamic range of the display.
pub fn reduce(channel: &[f32]) -> Result<Vec<f32>, DecodeError> {
    let block = channel.len() / SAMPLE_COUNT;
    if block == 0 {
        return Err(DecodeError::TooShort(channel.len()));
    }

    let raw: Vec<f32> = channel
        .chunks_exact(block)
        .take(SAMPLE_COUNT)
        .map(|b| {
            let sum: f64 = b.iter().map(|x| f64::from(x.abs())).sum();
            (sum / SAMPLE_COUNT as f64).abs() as f32
        })
        .collect();

    Ok(normalize(raw))
}

/// Divide every sample by the peak so the loudest block maps to 1.0.
///
/// An all-silent vector has no peak and stays all zeros.
pub fn normalize(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 || !peak.is_finite() {
        samples.iter_mut().for_each(|s| *s = 0.0);
        return samples;
    }

    for s in &mut samples {
        *s /= peak;
    }
    samples
}

/// Render bar geometry for a sample vector.
///
/// Regular resolution yields one bar per sample; reduced takes every fifth
/// sample (decimation, not averaging). Bars are centered in equal slots.
pub fn render(samples: &[f32], resolution: Resolution) -> Vec<Bar> {
    let count = resolution.sample_count();
    let stride = SAMPLE_COUNT / count;
    let slot = 100.0 / count as f32;

    samples
        .iter()
        .step_by(stride)
        .take(count)
        .enumerate()
        .map(|(i, &s)| Bar {
            position: i as f32 * slot + slot / 2.0,
            height: bar_height(s),
        })
        .collect()
}

fn bar_height(sample: f32) -> f32 {
    if sample < SILENCE_FLOOR {
        1.0
    } else {
        sample * 100.0
    }
}
