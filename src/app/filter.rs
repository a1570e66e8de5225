//! Pure derivations over the in-memory item projection.
//!
//! Nothing here caches: every view is recomputed from the full item list on
//! each call, which is cheap at menubar-reader volumes.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::feed::parse_pub_date;
use crate::storage::{FeedItem, FeedSource};
use crate::util::contains_ignore_case;

/// Which subset of items the reader is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Unread,
    Read,
    /// Items of a single feed source
    Feed(FeedSource),
}

impl Filter {
    pub fn matches(&self, item: &FeedItem) -> bool {
        match self {
            Filter::All => true,
            Filter::Unread => !item.is_read,
            Filter::Read => item.is_read,
            Filter::Feed(source) => item.feed_source_url == source.url,
        }
    }

    /// Filter equality for selection purposes; per-feed filters compare by url
    /// only, so a renamed source stays selected.
    pub fn same_selection(&self, other: &Filter) -> bool {
        match (self, other) {
            (Filter::Feed(a), Filter::Feed(b)) => a.url == b.url,
            _ => self == other,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Filter::All => "All",
            Filter::Unread => "Unread",
            Filter::Read => "Read",
            Filter::Feed(source) => &source.name,
        }
    }
}

/// Items matching `filter` whose title contains `search` (case-insensitive).
///
/// The search text is matched as typed, surrounding whitespace included. An
/// empty search matches everything. Order of `items` is preserved.
pub fn filter_items<'a>(items: &'a [FeedItem], filter: &Filter, search: &str) -> Vec<&'a FeedItem> {
    items
        .iter()
        .filter(|item| filter.matches(item))
        .filter(|item| contains_ignore_case(&item.title, search))
        .collect()
}

pub fn count_matching(items: &[FeedItem], filter: &Filter) -> usize {
    items.iter().filter(|item| filter.matches(item)).count()
}

/// Whether the item's publish date lies strictly before `cutoff`.
///
/// Items with an empty or unparsable date are never old.
pub fn is_published_before(item: &FeedItem, cutoff: DateTime<Utc>) -> bool {
    parse_pub_date(&item.pub_date).is_some_and(|published| published < cutoff)
}

/// Cutoff used by old-item cleanup: `days` before `now`.
pub fn age_cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}
