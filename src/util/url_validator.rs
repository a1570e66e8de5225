use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a feed or article URL.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    /// Nothing left after trimming whitespace.
    #[error("URL is empty")]
    Empty,
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates and normalizes a user-supplied feed URL.
///
/// Surrounding whitespace is trimmed, then the URL must parse and use the
/// `http` or `https` scheme with a host. The trimmed input is returned as
/// written (not re-serialized), so it stays byte-identical to what the user
/// subscribed to and keeps working as the join key for stored items.
///
/// # Examples
///
/// ```
/// use rssbar::util::normalize_feed_url;
///
/// let url = normalize_feed_url("  https://example.com/feed.xml \n").unwrap();
/// assert_eq!(url, "https://example.com/feed.xml");
///
/// assert!(normalize_feed_url("file:///etc/passwd").is_err());
/// assert!(normalize_feed_url("   ").is_err());
/// ```
pub fn normalize_feed_url(raw: &str) -> Result<String, UrlValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    validate_http_url(trimmed)?;
    Ok(trimmed.to_string())
}

/// Whether `link` is an absolute http(s) URL usable as an article link.
pub fn is_http_link(link: &str) -> bool {
    validate_http_url(link).is_ok()
}

fn validate_http_url(s: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(s)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
