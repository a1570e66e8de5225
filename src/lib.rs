//! rssbar: a small RSS/Atom reader core.
//!
//! Polls subscribed feeds, keeps their articles in SQLite and never brings
//! back an article the user deleted.
//!
//! - [`storage`] - SQLite store for feed sources, items and tombstones
//! - [`feed`] - parsing, fetching and bounded fan-out refresh
//! - [`app`] - application context and the view-state controller
//! - [`scheduler`] - cancellable polling timer
//! - [`daemon`] - long-running poll loop with signal handling
//! - [`config`] - user settings file

pub mod app;
pub mod config;
pub mod daemon;
pub mod feed;
pub mod scheduler;
pub mod storage;
pub mod util;
