//! Feed retrieval: parsing, fetching and refresh orchestration.
//!
//! - [`parser`] - RSS/Atom/JSON Feed parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP download with size and time limits
//! - [`refresh`] - one-shot and fan-out refresh that reconciles results into
//!   the store from a single task
//!
//! # Example
//!
//! ```ignore
//! use rssbar::feed::{refresh_all, RefreshOptions};
//!
//! let sources = db.fetch_feed_sources().await?;
//! let summary = refresh_all(&db, &client, &sources, RefreshOptions::default()).await;
//! println!("{} new items", summary.new_items());
//! ```

mod fetcher;
mod parser;
mod refresh;

pub use fetcher::{fetch_entries, FetchError};
pub use parser::{format_pub_date, parse_feed, parse_pub_date, ParseResult};
pub use refresh::{refresh_all, refresh_one, RefreshOptions, RefreshReport, RefreshSummary};
