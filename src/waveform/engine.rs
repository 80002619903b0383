//! Decode engines: raw audio bytes → per-sample amplitudes for channel 0.
//!
//! [`DecodeEngine`] is the async capability the cache depends on. Engines
//! built around a completion callback implement [`CallbackDecodeEngine`]
//! instead and are adapted with [`CallbackEngine`].
//!
//! The production engine uses symphonia and supports:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Amplitudes of one decoded channel.
#[derive(Debug, Clone, Default)]
pub struct DecodedChannel {
    pub samples: Vec<f32>,
    pub sample_rate: Option<u32>,
}

impl DecodedChannel {
    /// Clip length, when the sample rate is known.
    pub fn duration(&self) -> Option<Duration> {
        let rate = self.sample_rate.filter(|r| *r > 0)?;
        Some(Duration::from_secs_f64(
            self.samples.len() as f64 / f64::from(rate),
        ))
    }
}

/// Decoding errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Channel too short to sample: {0} samples")]
    TooShort(usize),

    #[error("Decoder dropped the request without answering")]
    Abandoned,
}

/// Async decode capability.
#[async_trait]
pub trait DecodeEngine: Send + Sync {
    /// Decode `bytes` and return channel 0.
    ///
    /// `extension` is a format hint taken from the source URL.
    async fn decode_channel(
        &self,
        bytes: Arc<[u8]>,
        extension: Option<&str>,
    ) -> Result<DecodedChannel, DecodeError>;
}

/// Completion callback handed to a [`CallbackDecodeEngine`].
pub type DecodeCallback = Box<dyn FnOnce(Result<DecodedChannel, DecodeError>) + Send>;

/// Decode capability that reports through a callback instead of a future.
pub trait CallbackDecodeEngine: Send + Sync {
    /// Start decoding; `done` must be invoked at most once.
    fn decode_with(&self, bytes: Arc<[u8]>, done: DecodeCallback);
}

/// Adapts a [`CallbackDecodeEngine`] into a [`DecodeEngine`].
pub struct CallbackEngine<E>(pub E);

#[async_trait]
impl<E: CallbackDecodeEngine> DecodeEngine for CallbackEngine<E> {
    async fn decode_channel(
        &self,
        bytes: Arc<[u8]>,
        _extension: Option<&str>,
    ) -> Result<DecodedChannel, DecodeError> {
        let (tx, rx) = futures::channel::oneshot::channel();
        self.0.decode_with(
            bytes,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.map_err(|_| DecodeError::Abandoned)?
    }
}

/// Symphonia-backed engine. Decoding runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaEngine;

#[async_trait]
impl DecodeEngine for SymphoniaEngine {
    async fn decode_channel(
        &self,
        bytes: Arc<[u8]>,
        extension: Option<&str>,
    ) -> Result<DecodedChannel, DecodeError> {
        let extension = extension.map(str::to_owned);
        tokio::task::spawn_blocking(move || decode_first_channel(bytes, extension.as_deref()))
            .await
            .map_err(|e| DecodeError::Decode(format!("Decode task failed: {}", e)))?
    }
}

/// Decode every packet of the first audio track, keeping channel 0.
fn decode_first_channel(
    bytes: Arc<[u8]>,
    extension: Option<&str>,
) -> Result<DecodedChannel, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => continue, // Skip bad frame
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);

        let needs_alloc = buffer
            .as_ref()
            .is_none_or(|b| b.capacity() < decoded.capacity() * channels);
        if needs_alloc {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend(buf.samples().iter().step_by(channels).copied());
    }

    if samples.is_empty() {
        return Err(DecodeError::Decode("Stream contained no audio".to_string()));
    }

    Ok(DecodedChannel {
        samples,
        sample_rate,
    })
}
