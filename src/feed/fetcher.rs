use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::{parse_feed, ParseResult};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while refreshing one feed source.
///
/// Covers the full lifecycle of a fetch: network issues, HTTP errors,
/// parsing failures, and the final store commit.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-source timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Storing reconciled entries failed
    #[error("Database error: {0}")]
    Database(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Download and parse one feed document.
///
/// Does not touch the store, so it is safe to run many of these at once.
/// The whole request, including reading the body, is bounded by `timeout`.
/// There are no retries; the next scheduled or manual refresh is the retry.
///
/// # Errors
///
/// - [`FetchError::Network`] for transport failures
/// - [`FetchError::HttpStatus`] for any non-2xx response
/// - [`FetchError::Timeout`] when `timeout` elapses
/// - [`FetchError::ResponseTooLarge`] for bodies over 10MB
/// - [`FetchError::Parse`] when the document is not a feed
pub async fn fetch_entries(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ParseResult, FetchError> {
    let bytes = tokio::time::timeout(timeout, download(client, url))
        .await
        .map_err(|_| FetchError::Timeout(timeout.as_secs()))??;

    let result = parse_feed(&bytes, Some(url)).map_err(|e| FetchError::Parse(e.to_string()))?;

    if result.skipped > 0 {
        tracing::warn!(
            feed = %url,
            skipped = result.skipped,
            "Entries without a usable link skipped"
        );
    }

    Ok(result)
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
