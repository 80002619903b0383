//! Playable handles: shared, immutable references to fetched audio bytes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Url;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to playable bytes.
///
/// Cloning is cheap and keeps identity: clones compare equal under
/// [`PlayableHandle::same`]. The bytes are freed when the last clone drops.
#[derive(Clone)]
pub struct PlayableHandle(Arc<HandleInner>);

struct HandleInner {
    id: u64,
    source: Url,
    bytes: Arc<[u8]>,
    mime_type: String,
    duration: Option<Duration>,
}

impl PlayableHandle {
    pub fn new(
        source: Url,
        bytes: Arc<[u8]>,
        mime_type: impl Into<String>,
        duration: Option<Duration>,
    ) -> Self {
        Self(Arc::new(HandleInner {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            source,
            bytes,
            mime_type: mime_type.into(),
            duration,
        }))
    }

    /// Whether two handles refer to the same bytes.
    pub fn same(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Ephemeral URI for the media element, unique per handle.
    pub fn uri(&self) -> String {
        format!("blob:waveplay/{}", self.0.id)
    }

    /// The URL the bytes were fetched from.
    pub fn source(&self) -> &Url {
        &self.0.source
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.0.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.0.mime_type
    }

    /// Clip length, when the decoder reported one.
    pub fn duration(&self) -> Option<Duration> {
        self.0.duration
    }
}

impl fmt::Debug for PlayableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableHandle")
            .field("id", &self.0.id)
            .field("source", &self.0.source.as_str())
            .field("mime_type", &self.0.mime_type)
            .field("len", &self.0.bytes.len())
            .finish()
    }
}

/// MIME type for a source, preferring the server's declaration.
pub(crate) fn mime_type(content_type: Option<&str>, extension: Option<&str>) -> String {
    if let Some(ct) = content_type.filter(|ct| ct.starts_with("audio/")) {
        return ct.split(';').next().unwrap_or(ct).trim().to_string();
    }
    match extension {
        Some("ogg" | "oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("m4a" | "mp4" | "aac") => "audio/mp4",
        _ => "audio/mpeg",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> PlayableHandle {
        PlayableHandle::new(
            Url::parse("https://example.com/a.mp3").unwrap(),
            vec![1u8, 2, 3].into(),
            "audio/mpeg",
            None,
        )
    }

    #[test]
    fn test_clones_share_identity() {
        let a = handle();
        let b = a.clone();
        assert!(PlayableHandle::same(&a, &b));
        assert_eq!(a.uri(), b.uri());
    }

    #[test]
    fn test_distinct_handles_differ() {
        let a = handle();
        let b = handle();
        assert!(!PlayableHandle::same(&a, &b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_mime_type_resolution() {
        assert_eq!(mime_type(Some("audio/ogg; codecs=vorbis"), None), "audio/ogg");
        assert_eq!(mime_type(Some("application/octet-stream"), Some("flac")), "audio/flac");
        assert_eq!(mime_type(None, None), "audio/mpeg");
    }
}
