//! Source byte fetching.
//!
//! The loader only needs `fetch(url) -> bytes`; retries, caching and
//! redirect policy are left to the implementation (reqwest's defaults for
//! HTTP).

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::LoaderError;

/// Capability to fetch a source file's bytes.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LoaderError>>;
}

/// HTTP(S) fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, LoaderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LoaderError::internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client (proxy, TLS or header settings).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LoaderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| LoaderError::fetch(url, format!("HTTP request failed: {err}")))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(LoaderError::fetch(url, format!("HTTP {status}")));
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|err| LoaderError::fetch(url, format!("failed to read response: {err}")))?;
            debug!(url, bytes = bytes.len(), "fetched source");
            Ok(bytes)
        })
    }
}

/// Fetches `http://`/`https://` URLs over HTTP and anything else from the
/// local filesystem (a leading `file://` is stripped).
#[derive(Clone)]
pub struct SourceFetcher {
    http: HttpFetcher,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self, LoaderError> {
        Ok(Self {
            http: HttpFetcher::new(timeout)?,
        })
    }
}

fn is_http(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl Fetcher for SourceFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LoaderError>> {
        if is_http(url) {
            return self.http.fetch(url);
        }
        Box::pin(async move {
            let path = url.strip_prefix("file://").unwrap_or(url);
            let data = tokio::fs::read(path)
                .await
                .map_err(|err| LoaderError::fetch(url, format!("failed to read file: {err}")))?;
            debug!(path, bytes = data.len(), "read local source");
            Ok(Bytes::from(data))
        })
    }
}
