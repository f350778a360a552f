//! Transport seam between the transfer engine and the archive host.
//!
//! `ArchiveFetcher` is the trait the engine drives; `HttpFetcher` is the
//! production implementation over reqwest. The split keeps retry and
//! concurrency policy in the engine and lets tests substitute an
//! instrumented fake host.
//!
//! A fetch always buffers the complete body to a temporary file before
//! returning, so an interrupted read can never turn into a truncated upload.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MirrorError, MirrorResult};

/// Failure modes of a single fetch, classified for retry policy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The connection dropped mid-request or mid-body. Transient; the engine
    /// retries these with a fixed backoff.
    #[error("connection to {url} dropped: {message}")]
    Disconnected { url: String, message: String },

    /// The request timed out. Not retried; a timeout aborts the whole batch.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The host answered with a non-success status. Not transient.
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// Local I/O failure while buffering the body.
    #[error("i/o error while buffering {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Headers captured by an existence probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeInfo {
    pub last_modified: Option<DateTime<Utc>>,
    pub content_length: Option<u64>,
}

/// A fully-buffered archive body plus the headers captured before reading it.
#[derive(Debug)]
pub struct FetchedArchive {
    /// Temporary file holding the complete body. The caller owns cleanup.
    pub path: PathBuf,
    /// Bytes actually read.
    pub bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_length: Option<u64>,
}

/// Read access to the archive host.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Issue an existence probe (HEAD) without reading a body.
    async fn probe(&self, url: &str) -> Result<ProbeInfo, FetchError>;

    /// GET the archive, buffering the full body to a temporary file.
    async fn fetch(&self, url: &str) -> Result<FetchedArchive, FetchError>;
}

/// Production fetcher over HTTP.
pub struct HttpFetcher {
    client: Client,
    temp_dir: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher buffering bodies under `temp_dir`.
    pub fn new(temp_dir: PathBuf, request_timeout: Duration) -> MirrorResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| MirrorError::Client(e.to_string()))?;

        Ok(Self { client, temp_dir })
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Disconnected {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Parse an HTTP `Last-Modified` header value.
fn parse_http_date(value: Option<&header::HeaderValue>) -> Option<DateTime<Utc>> {
    let text = value?.to_str().ok()?;
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_content_length(value: Option<&header::HeaderValue>) -> Option<u64> {
    value?.to_str().ok()?.parse().ok()
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn probe(&self, url: &str) -> Result<ProbeInfo, FetchError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(ProbeInfo {
            last_modified: parse_http_date(response.headers().get(header::LAST_MODIFIED)),
            content_length: parse_content_length(response.headers().get(header::CONTENT_LENGTH)),
        })
    }

    async fn fetch(&self, url: &str) -> Result<FetchedArchive, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Capture headers before touching the body.
        let last_modified = parse_http_date(response.headers().get(header::LAST_MODIFIED));
        let content_length = parse_content_length(response.headers().get(header::CONTENT_LENGTH));

        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        fs::create_dir_all(&self.temp_dir).await.map_err(io_err)?;

        let filename = url.rsplit('/').next().unwrap_or("archive");
        let path = self.temp_dir.join(format!("{}.partial", filename));
        let mut file = File::create(&path).await.map_err(io_err)?;

        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::classify(url, e))?;
            file.write_all(&chunk).await.map_err(io_err)?;
            bytes += chunk.len() as u64;
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        debug!(url = %url, bytes = bytes, path = %path.display(), "body buffered");

        Ok(FetchedArchive {
            path,
            bytes,
            last_modified,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_date() {
        let value = header::HeaderValue::from_static("Thu, 01 Feb 1979 00:00:00 GMT");
        let parsed = parse_http_date(Some(&value)).unwrap();
        assert_eq!(parsed.to_rfc3339(), "1979-02-01T00:00:00+00:00");

        let bad = header::HeaderValue::from_static("not a date");
        assert!(parse_http_date(Some(&bad)).is_none());
        assert!(parse_http_date(None).is_none());
    }

    #[test]
    fn test_parse_content_length() {
        let value = header::HeaderValue::from_static("12345");
        assert_eq!(parse_content_length(Some(&value)), Some(12345));
        assert_eq!(parse_content_length(None), None);
    }
}
