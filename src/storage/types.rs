use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of rssbar appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A record addressed by key does not exist
    #[error("No {kind} with key {key}")]
    NotFound { kind: &'static str, key: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A subscribed RSS/Atom endpoint. `url` is the join key to [`FeedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeedSource {
    pub url: String,
    pub name: String,
}

/// A single article fetched from a feed source.
///
/// `pub_date` is textual: RFC 3339 UTC when the feed carried a parsable date,
/// empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub feed_source_url: String,
    pub is_read: bool,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub fetched_at: i64,
}

/// Tombstone recording that an article link was deliberately removed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeletedArticle {
    pub link: String,
    pub deleted_at: i64,
}

/// Candidate entry produced by the parser, not yet reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub summary: Option<String>,
    pub content: Option<String>,
}

// ============================================================================
// Query Predicates
// ============================================================================

/// Which feed items a fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPredicate<'a> {
    All,
    /// Items whose `feed_source_url` equals the given url
    Source(&'a str),
    /// Items with the given read state
    Read(bool),
    /// Items with one of the given ids
    Ids(&'a [String]),
}

/// Ordering of fetched feed items, by `pub_date` then `fetched_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl ItemSort {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            ItemSort::NewestFirst => " ORDER BY pub_date DESC, fetched_at DESC, id",
            ItemSort::OldestFirst => " ORDER BY pub_date ASC, fetched_at ASC, id",
        }
    }
}
