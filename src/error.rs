//! Crate-wide error types.
//!
//! Every player operation returns [`Result`], so callers can always
//! await-and-handle instead of catching panics. Lower layers keep their own
//! error types (cache, media, config) which convert into
//! [`Error`] at the player boundary. The binary uses `anyhow` on top.
//!
//! # Taxonomy
//!
//! - [`Error::InvalidArgument`]: missing URL, empty playlist
//! - [`Error::DuplicateSource`]: URL already queued
//! - [`Error::ActiveSourceConflict`]: dequeue or redefine the active source
//! - [`Error::NotFound`]: operation target absent from the queue
//! - [`Error::QueueExhausted`]: advance past the last entry
//! - [`Error::DecodeFailure`]: network, decode or media buffering failure
//! - [`Error::NotReady`]: media operation before a media element is attached,
//!   or play with nothing loaded into it

use crate::config::ConfigError;
use crate::player::MediaError;
use crate::source::CacheError;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level player error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The URL is already present in the queue
    #[error("Source already queued: {0}")]
    DuplicateSource(String),

    /// The operation would remove or redefine the active source
    #[error("Active source conflict: {0}")]
    ActiveSourceConflict(String),

    /// The target is not in the queue
    #[error("Source not found: {0}")]
    NotFound(String),

    /// There is no entry after the active one
    #[error("Queue exhausted: no source after {0}")]
    QueueExhausted(String),

    /// Fetching, decoding or buffering failed
    #[error("Decode failure for {url}: {message}")]
    DecodeFailure { url: String, message: String },

    /// No media element attached yet
    #[error("Player not ready: no media element attached")]
    NotReady,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid-argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a decode failure for a URL.
    pub fn decode_failure(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The taxonomy kind, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::DuplicateSource(_) => ErrorKind::DuplicateSource,
            Self::ActiveSourceConflict(_) => ErrorKind::ActiveSourceConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::QueueExhausted(_) => ErrorKind::QueueExhausted,
            Self::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            Self::NotReady => ErrorKind::NotReady,
            Self::Config(_) => ErrorKind::Config,
            Self::WithContext { source, .. } => source.kind(),
        }
    }
}

/// Flat error kind, convenient for matching in hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    DuplicateSource,
    ActiveSourceConflict,
    NotFound,
    QueueExhausted,
    DecodeFailure,
    NotReady,
    Config,
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Self {
        Self::decode_failure(e.url().to_string(), e.to_string())
    }
}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Load { url, message } => Self::DecodeFailure { url, message },
            MediaError::NoSource => Self::NotReady,
            MediaError::Rejected(reason) => Self::decode_failure("<media>", reason),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}
