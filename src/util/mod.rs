//! Utility functions for common operations.
//!
//! - **URL validation**: feed URLs must be absolute http(s) URLs
//! - **Text processing**: title cleanup and case-insensitive matching

mod text;
mod url_validator;

pub use text::{clean_title, contains_ignore_case};
pub use url_validator::{is_http_link, normalize_feed_url, UrlValidationError};
