//! Byte fetching for source URLs.
//!
//! `http`/`https` go through reqwest; `file://` URLs are read from disk so
//! local files can be played without a server.

use async_trait::async_trait;
use reqwest::Url;

/// Raw response body plus its declared content type.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetch errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read {url}: {message}")]
    Io { url: String, message: String },

    #[error("Unsupported URL scheme: {url}")]
    UnsupportedScheme { url: String },
}

impl FetchError {
    /// The URL that failed.
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::Io { url, .. }
            | Self::UnsupportedScheme { url } => url,
        }
    }
}

/// Fetch capability, injectable for tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the full body at `url`.
    async fn fetch(&self, url: &Url) -> Result<Fetched, FetchError>;
}

/// reqwest-backed fetcher with `file://` support.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, timeouts, headers).
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn fetch_http(&self, url: &Url) -> Result<Fetched, FetchError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .to_vec();

        Ok(Fetched {
            bytes,
            content_type,
        })
    }

    async fn fetch_file(&self, url: &Url) -> Result<Fetched, FetchError> {
        let path = url.to_file_path().map_err(|_| FetchError::Io {
            url: url.to_string(),
            message: "not a local path".to_string(),
        })?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| FetchError::Io {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Fetched {
            bytes,
            content_type: None,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        tracing::debug!(%url, "fetching");
        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => self.fetch_file(url).await,
            _ => Err(FetchError::UnsupportedScheme {
                url: url.to_string(),
            }),
        }
    }
}
