//! Retrieval of upstream program feeds.
//!
//! The import service only depends on the [`Fetch`] trait. [`HttpFetcher`]
//! is the production implementation and downloads the feed over HTTP(S).

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use pi_core::RawEntry;
use reqwest::Url;
use reqwest::header::ACCEPT;
use thiserror::Error;

/// Default request timeout for feed downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed retrieval errors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source is not an absolute http(s) URL.
    #[error("invalid source URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request could not be completed.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The source answered with a non-success status.
    #[error("source responded with status {status}")]
    Status { status: reqwest::StatusCode },
    /// The body is not a JSON array of entry objects.
    #[error("malformed program document: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// A validated absolute http(s) URL of a program feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl(Url);

impl SourceUrl {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let url = Url::parse(raw).map_err(|err| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            scheme => Err(FetchError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme `{scheme}`"),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub const fn as_url(&self) -> &Url {
        &self.0
    }
}

impl FromStr for SourceUrl {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can retrieve and decode the upstream feed.
pub trait Fetch {
    /// Downloads the document at `source` and decodes it into raw entries.
    fn fetch(
        &self,
        source: &SourceUrl,
    ) -> impl Future<Output = Result<Vec<RawEntry>, FetchError>> + Send;
}

/// Fetches program feeds over HTTP.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher using [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { http })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, source: &SourceUrl) -> Result<Vec<RawEntry>, FetchError> {
        let response = self
            .http
            .get(source.as_url().clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = response.bytes().await?;
        tracing::debug!(url = %source, bytes = body.len(), "downloaded program document");
        decode_entries(&body)
    }
}

/// Decodes a feed body into raw entries.
///
/// Only the outer shape is checked here: a JSON array whose items are all
/// objects. Field presence is left to validation.
pub fn decode_entries(body: &[u8]) -> Result<Vec<RawEntry>, FetchError> {
    serde_json::from_slice(body).map_err(FetchError::Malformed)
}
