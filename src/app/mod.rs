//! View-state controller.
//!
//! [`FeedController`] keeps two in-memory projections of the store (feed
//! sources sorted by name, items sorted newest first) and derives every view
//! from them on demand. Each command writes through to the store in one
//! transaction and then re-pulls both projections, so the projections never
//! drift from what was committed. A failed command leaves them as they were
//! and returns the error to the caller.

mod context;
mod filter;

pub use context::{build_http_client, AppContext};
pub use filter::{age_cutoff, count_matching, filter_items, is_published_before, Filter};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Settings;
use crate::feed::{refresh_all, refresh_one, RefreshReport, RefreshSummary};
use crate::storage::{DatabaseError, FeedItem, FeedSource, ItemPredicate, ItemSort};
use crate::util::{normalize_feed_url, UrlValidationError};

/// Sources seeded on first launch, as `(name, url)`.
pub const DEFAULT_FEEDS: &[(&str, &str)] = &[("joshwcomeau", "https://www.joshwcomeau.com/rss.xml")];

/// Items older than this many days are removed by [`FeedController::clean_old_items`].
pub const OLD_ITEM_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum AddFeedError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of [`FeedController::add_feed_source`].
#[derive(Debug)]
pub enum AddFeedOutcome {
    /// Source stored; carries the report of its first fetch
    Added(RefreshReport),
    /// A source with the same url was already subscribed; nothing changed
    AlreadyExists,
}

pub struct FeedController {
    ctx: AppContext,
    feed_sources: Vec<FeedSource>,
    all_feed_items: Vec<FeedItem>,
    selected_filter: Filter,
    search_text: String,
    sort: ItemSort,
    is_loading: bool,
}

impl FeedController {
    /// Build a controller and pull the initial projections.
    pub async fn load(ctx: AppContext) -> Result<Self, DatabaseError> {
        let mut controller = Self {
            ctx,
            feed_sources: Vec::new(),
            all_feed_items: Vec::new(),
            selected_filter: Filter::default(),
            search_text: String::new(),
            sort: ItemSort::default(),
            is_loading: false,
        };
        controller.reload().await?;
        Ok(controller)
    }

    /// Re-pull both projections from the store.
    pub async fn reload(&mut self) -> Result<(), DatabaseError> {
        let sources = self.ctx.db.fetch_feed_sources().await;
        let items = self.ctx.db.fetch_items(ItemPredicate::All, self.sort).await;

        match (sources, items) {
            (Ok(sources), Ok(items)) => {
                self.feed_sources = sources;
                self.all_feed_items = items;
                self.sync_selected_filter();
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to reload feed data");
                Err(e)
            }
        }
    }

    /// A per-feed filter whose source no longer exists falls back to `All`;
    /// a renamed source keeps its selection with the new name.
    fn sync_selected_filter(&mut self) {
        if let Filter::Feed(selected) = &self.selected_filter {
            self.selected_filter = match self.feed_sources.iter().find(|s| s.url == selected.url) {
                Some(current) => Filter::Feed(current.clone()),
                None => Filter::All,
            };
        }
    }

    // ------------------------------------------------------------------
    // Published state and derived views
    // ------------------------------------------------------------------

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Swap in freshly loaded settings. Applies to the next refresh.
    pub fn set_settings(&mut self, settings: Settings) {
        self.ctx.settings = settings;
    }

    pub fn feed_sources(&self) -> &[FeedSource] {
        &self.feed_sources
    }

    pub fn all_feed_items(&self) -> &[FeedItem] {
        &self.all_feed_items
    }

    pub fn selected_filter(&self) -> &Filter {
        &self.selected_filter
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Items under the selected filter whose title contains the search text.
    pub fn filtered_feed_items(&self) -> Vec<&FeedItem> {
        filter_items(&self.all_feed_items, &self.selected_filter, &self.search_text)
    }

    pub fn unread_count(&self) -> usize {
        count_matching(&self.all_feed_items, &Filter::Unread)
    }

    pub fn read_count(&self) -> usize {
        count_matching(&self.all_feed_items, &Filter::Read)
    }

    pub fn all_count(&self) -> usize {
        self.all_feed_items.len()
    }

    pub fn unread_count_for(&self, source: &FeedSource) -> usize {
        self.all_feed_items
            .iter()
            .filter(|i| i.feed_source_url == source.url && !i.is_read)
            .count()
    }

    /// Badge count for a filter, `None` when zero. Per-feed filters carry no badge.
    pub fn filter_count(&self, filter: &Filter) -> Option<usize> {
        let count = match filter {
            Filter::All => self.all_count(),
            Filter::Unread => self.unread_count(),
            Filter::Read => self.read_count(),
            Filter::Feed(_) => return None,
        };
        (count > 0).then_some(count)
    }

    pub fn is_filter_selected(&self, filter: &Filter) -> bool {
        self.selected_filter.same_selection(filter)
    }

    pub fn select_filter(&mut self, filter: Filter) {
        self.selected_filter = filter;
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    /// Change item ordering and re-pull the projection.
    pub async fn set_sort(&mut self, sort: ItemSort) -> Result<(), DatabaseError> {
        self.sort = sort;
        self.reload().await
    }

    // ------------------------------------------------------------------
    // Feed source commands
    // ------------------------------------------------------------------

    /// Insert the built-in sources that are not subscribed yet.
    ///
    /// # Returns
    ///
    /// Number of sources inserted.
    pub async fn add_default_feeds(&mut self) -> Result<usize, DatabaseError> {
        let mut added = 0;
        for (name, url) in DEFAULT_FEEDS {
            if self.ctx.db.insert_feed_source(url, name).await? {
                added += 1;
            }
        }
        self.reload().await?;
        tracing::info!(added, "Seeded default feeds");
        Ok(added)
    }

    /// Subscribe to a feed and fetch it once.
    ///
    /// Both arguments are trimmed. An empty name falls back to the url.
    pub async fn add_feed_source(&mut self, url: &str, name: &str) -> Result<AddFeedOutcome, AddFeedError> {
        let url = normalize_feed_url(url)?;
        let name = match name.trim() {
            "" => url.clone(),
            trimmed => trimmed.to_string(),
        };

        if self.feed_sources.iter().any(|s| s.url == url) || !self.ctx.db.insert_feed_source(&url, &name).await? {
            tracing::debug!(feed = %url, "Feed source already exists");
            return Ok(AddFeedOutcome::AlreadyExists);
        }
        self.reload().await?;
        tracing::info!(feed = %url, name = %name, "Added feed source");

        let source = FeedSource { url, name };
        let mut summary = self.run_refresh(std::slice::from_ref(&source)).await?;
        let report = summary.reports.pop().unwrap_or(RefreshReport {
            source_url: source.url,
            result: Ok(0),
        });
        Ok(AddFeedOutcome::Added(report))
    }

    pub async fn rename_feed_source(&mut self, url: &str, name: &str) -> Result<(), DatabaseError> {
        self.ctx.db.rename_feed_source(url, name.trim()).await?;
        self.reload().await
    }

    /// Unsubscribe; every item of the source is archived and removed.
    ///
    /// # Returns
    ///
    /// Number of items removed with the source.
    pub async fn delete_feed(&mut self, source: &FeedSource) -> Result<usize, DatabaseError> {
        let removed = self.ctx.db.delete_feed_source(&source.url).await?;
        self.reload().await?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Item commands
    // ------------------------------------------------------------------

    /// Tombstone then delete `items`. The only way items leave the store.
    pub async fn archive_and_delete(&mut self, items: &[FeedItem]) -> Result<usize, DatabaseError> {
        let deleted = self.ctx.db.archive_and_delete(items).await?;
        self.reload().await?;
        Ok(deleted)
    }

    /// Archive and delete the items at `indices` of the current filtered view.
    /// Out-of-range indices are ignored.
    pub async fn delete_items(&mut self, indices: &[usize]) -> Result<usize, DatabaseError> {
        let items: Vec<FeedItem> = {
            let view = self.filtered_feed_items();
            indices
                .iter()
                .filter_map(|&i| view.get(i).map(|item| (*item).clone()))
                .collect()
        };
        self.archive_and_delete(&items).await
    }

    pub async fn mark_as_read(&mut self, item_id: &str) -> Result<bool, DatabaseError> {
        let changed = self.ctx.db.set_item_read(item_id, true).await?;
        self.reload().await?;
        Ok(changed)
    }

    /// Flip the read flag; returns the new value.
    pub async fn toggle_read_status(&mut self, item_id: &str) -> Result<bool, DatabaseError> {
        let now_read = self.ctx.db.toggle_item_read(item_id).await?;
        self.reload().await?;
        Ok(now_read)
    }

    /// Mark every unread item of the current filtered view as read.
    pub async fn mark_all_as_read(&mut self) -> Result<u64, DatabaseError> {
        let ids: Vec<String> = self
            .filtered_feed_items()
            .into_iter()
            .filter(|i| !i.is_read)
            .map(|i| i.id.clone())
            .collect();
        let marked = self.ctx.db.mark_items_read(&ids).await?;
        self.reload().await?;
        Ok(marked)
    }

    pub async fn clean_read_items(&mut self) -> Result<usize, DatabaseError> {
        let read = self
            .ctx
            .db
            .fetch_items(ItemPredicate::Read(true), ItemSort::default())
            .await?;
        self.archive_and_delete(&read).await
    }

    /// Archive and delete items published more than 30 days ago.
    pub async fn clean_old_items(&mut self) -> Result<usize, DatabaseError> {
        self.clean_items_older_than(age_cutoff(Utc::now(), OLD_ITEM_DAYS))
            .await
    }

    /// Archive and delete items published before `cutoff`. Items without a
    /// parsable date are kept.
    pub async fn clean_items_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let old: Vec<FeedItem> = self
            .all_feed_items
            .iter()
            .filter(|i| is_published_before(i, cutoff))
            .cloned()
            .collect();
        self.archive_and_delete(&old).await
    }

    pub async fn clear_all_feed_items(&mut self) -> Result<usize, DatabaseError> {
        let all = self
            .ctx
            .db
            .fetch_items(ItemPredicate::All, ItemSort::default())
            .await?;
        self.archive_and_delete(&all).await
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    pub async fn refresh_feed(&mut self, source: &FeedSource) -> Result<RefreshSummary, DatabaseError> {
        self.run_refresh(std::slice::from_ref(source)).await
    }

    pub async fn refresh_all_feeds(&mut self) -> Result<RefreshSummary, DatabaseError> {
        let sources = self.feed_sources.clone();
        self.run_refresh(&sources).await
    }

    /// Refresh just the selected feed under a per-feed filter, else every feed.
    pub async fn refresh_current_filter(&mut self) -> Result<RefreshSummary, DatabaseError> {
        match self.selected_filter.clone() {
            Filter::Feed(source) => self.refresh_feed(&source).await,
            _ => self.refresh_all_feeds().await,
        }
    }

    async fn run_refresh(&mut self, sources: &[FeedSource]) -> Result<RefreshSummary, DatabaseError> {
        let loading = LoadingFlag::raise(&mut self.is_loading);
        let options = self.ctx.settings.refresh_options();
        let summary: RefreshSummary = match sources {
            [single] => refresh_one(&self.ctx.db, &self.ctx.client, single, options)
                .await
                .into(),
            _ => refresh_all(&self.ctx.db, &self.ctx.client, sources, options).await,
        };
        drop(loading);

        self.reload().await?;
        Ok(summary)
    }
}

/// Holds `is_loading` up while a refresh is awaited. Lowers it on drop, so a
/// refresh future cancelled mid-flight does not leave the flag stuck.
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{format_pub_date, FetchError};
    use crate::storage::{Database, ParsedEntry};
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_controller() -> FeedController {
        controller_with(Settings::default()).await
    }

    async fn controller_with(settings: Settings) -> FeedController {
        let db = Database::open(":memory:").await.unwrap();
        let ctx = AppContext::new(db, settings).unwrap();
        FeedController::load(ctx).await.unwrap()
    }

    /// Mount a one-item feed at `route` that answers after `delay`.
    async fn slow_feed(server: &MockServer, route: &str, delay: std::time::Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(
                        r#"<rss version="2.0"><channel><item><title>Slow</title><link>https://slow.example{}</link></item></channel></rss>"#,
                        route
                    ))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    fn entry(link: &str, title: &str, pub_date: &str) -> ParsedEntry {
        ParsedEntry {
            title: title.to_string(),
            link: link.to_string(),
            pub_date: pub_date.to_string(),
            summary: None,
            content: None,
        }
    }

    /// Seed a source with entries directly through the store, then reload.
    async fn seed(c: &mut FeedController, url: &str, entries: &[ParsedEntry]) -> FeedSource {
        c.ctx.db.insert_feed_source(url, url).await.unwrap();
        c.ctx.db.reconcile_entries(url, entries).await.unwrap();
        c.reload().await.unwrap();
        c.feed_sources().iter().find(|s| s.url == url).unwrap().clone()
    }

    fn titles(c: &FeedController) -> Vec<String> {
        c.filtered_feed_items().iter().map(|i| i.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_projections_sorted() {
        let mut c = test_controller().await;
        c.ctx.db.insert_feed_source("https://z", "zeta").await.unwrap();
        seed(
            &mut c,
            "https://a",
            &[
                entry("https://a/1", "Older", "2024-01-01T00:00:00Z"),
                entry("https://a/2", "Newer", "2024-03-01T00:00:00Z"),
            ],
        )
        .await;

        let names: Vec<&str> = c.feed_sources().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["https://a", "zeta"]);
        assert_eq!(titles(&c), vec!["Newer", "Older"]);

        c.set_sort(ItemSort::OldestFirst).await.unwrap();
        assert_eq!(titles(&c), vec!["Older", "Newer"]);
    }

    #[tokio::test]
    async fn test_filter_search_and_counts() {
        let mut c = test_controller().await;
        let a = seed(
            &mut c,
            "https://a",
            &[entry("https://a/1", "Rust 2024", ""), entry("https://a/2", "Go news", "")],
        )
        .await;
        seed(&mut c, "https://b", &[entry("https://b/1", "rust tips", "")]).await;

        assert_eq!(c.filter_count(&Filter::All), Some(3));
        assert_eq!(c.filter_count(&Filter::Read), None);
        assert_eq!(c.filter_count(&Filter::Feed(a.clone())), None);

        let go = c.all_feed_items().iter().find(|i| i.title == "Go news").unwrap().id.clone();
        c.mark_as_read(&go).await.unwrap();
        assert_eq!(c.unread_count(), 2);
        assert_eq!(c.read_count(), 1);
        assert_eq!(c.unread_count_for(&a), 1);

        c.select_filter(Filter::Unread);
        c.set_search_text("RUST");
        assert_eq!(c.filtered_feed_items().len(), 2);

        c.select_filter(Filter::Feed(a.clone()));
        assert_eq!(titles(&c), vec!["Rust 2024"]);
        assert!(c.is_filter_selected(&Filter::Feed(FeedSource {
            url: a.url.clone(),
            name: "anything".to_string(),
        })));
        assert!(!c.is_filter_selected(&Filter::All));
    }

    #[tokio::test]
    async fn test_mark_all_as_read_only_touches_filtered_items() {
        let mut c = test_controller().await;
        let a = seed(&mut c, "https://a", &[entry("https://a/1", "A1", ""), entry("https://a/2", "A2", "")]).await;
        seed(&mut c, "https://b", &[entry("https://b/1", "B1", "")]).await;

        c.select_filter(Filter::Feed(a));
        assert_eq!(c.mark_all_as_read().await.unwrap(), 2);
        assert_eq!(c.unread_count(), 1);
        assert_eq!(c.mark_all_as_read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_read_status() {
        let mut c = test_controller().await;
        seed(&mut c, "https://a", &[entry("https://a/1", "A1", "")]).await;
        let id = c.all_feed_items()[0].id.clone();

        assert!(c.toggle_read_status(&id).await.unwrap());
        assert!(c.all_feed_items()[0].is_read);
        assert!(!c.toggle_read_status(&id).await.unwrap());
        assert!(!c.all_feed_items()[0].is_read);

        let err = c.toggle_read_status("missing").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_clean_read_items_archives() {
        let mut c = test_controller().await;
        seed(&mut c, "https://a", &[entry("https://a/1", "L1", ""), entry("https://a/2", "L2", "")]).await;
        let l1 = c.all_feed_items().iter().find(|i| i.title == "L1").unwrap().id.clone();
        c.mark_as_read(&l1).await.unwrap();

        assert_eq!(c.clean_read_items().await.unwrap(), 1);
        assert_eq!(titles(&c), vec!["L2"]);
        assert!(c.ctx.db.is_tombstoned("https://a/1").await.unwrap());
        assert!(!c.ctx.db.is_tombstoned("https://a/2").await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_old_items_uses_cutoff() {
        let mut c = test_controller().await;
        let now = Utc::now();
        seed(
            &mut c,
            "https://a",
            &[
                entry("https://a/old", "Old", &format_pub_date(now - Duration::days(40))),
                entry("https://a/new", "New", &format_pub_date(now - Duration::days(5))),
                entry("https://a/undated", "Undated", ""),
            ],
        )
        .await;

        assert_eq!(c.clean_old_items().await.unwrap(), 1);
        let mut remaining = titles(&c);
        remaining.sort();
        assert_eq!(remaining, vec!["New", "Undated"]);
        assert!(c.ctx.db.is_tombstoned("https://a/old").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_items_by_view_index() {
        let mut c = test_controller().await;
        seed(
            &mut c,
            "https://a",
            &[
                entry("https://a/1", "First", "2024-01-03T00:00:00Z"),
                entry("https://a/2", "Second", "2024-01-02T00:00:00Z"),
                entry("https://a/3", "Third", "2024-01-01T00:00:00Z"),
            ],
        )
        .await;

        assert_eq!(c.delete_items(&[0, 2, 99]).await.unwrap(), 2);
        assert_eq!(titles(&c), vec!["Second"]);
        assert_eq!(c.ctx.db.tombstone_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_and_delete_feed() {
        let mut c = test_controller().await;
        let a = seed(&mut c, "https://a", &[entry("https://a/1", "A1", "")]).await;
        seed(&mut c, "https://b", &[entry("https://b/1", "B1", "")]).await;

        c.select_filter(Filter::Feed(a.clone()));
        assert_eq!(c.delete_feed(&a).await.unwrap(), 1);
        assert_eq!(c.feed_sources().len(), 1);
        assert_eq!(c.selected_filter(), &Filter::All);
        assert!(c.all_feed_items().iter().all(|i| i.feed_source_url != a.url));

        assert_eq!(c.clear_all_feed_items().await.unwrap(), 1);
        assert_eq!(c.all_count(), 0);
        assert_eq!(c.ctx.db.tombstone_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rename_keeps_selection() {
        let mut c = test_controller().await;
        let a = seed(&mut c, "https://a", &[]).await;
        c.select_filter(Filter::Feed(a.clone()));

        c.rename_feed_source(&a.url, "  Renamed  ").await.unwrap();
        assert_eq!(c.feed_sources()[0].name, "Renamed");
        assert_eq!(c.selected_filter().label(), "Renamed");

        let err = c.rename_feed_source("https://nope", "x").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_default_feeds_is_idempotent() {
        let mut c = test_controller().await;
        assert_eq!(c.add_default_feeds().await.unwrap(), DEFAULT_FEEDS.len());
        assert_eq!(c.add_default_feeds().await.unwrap(), 0);
        assert_eq!(c.feed_sources().len(), DEFAULT_FEEDS.len());
    }

    #[tokio::test]
    async fn test_add_feed_source_fetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel>
                    <item><title>One</title><link>https://x.example/1</link></item>
                    <item><title>Two</title><link>https://x.example/2</link></item>
                </channel></rss>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut c = test_controller().await;
        let url = format!("{}/rss", server.uri());

        match c.add_feed_source(&format!("  {}  ", url), " X ").await.unwrap() {
            AddFeedOutcome::Added(report) => assert_eq!(report.result.unwrap(), 2),
            other => panic!("Expected Added, got {:?}", other),
        }
        assert!(!c.is_loading());
        assert_eq!(c.feed_sources()[0].name, "X");
        assert_eq!(c.all_count(), 2);
        assert!(c.all_feed_items().iter().all(|i| !i.is_read && i.feed_source_url == url));

        assert!(matches!(
            c.add_feed_source(&url, "Again").await.unwrap(),
            AddFeedOutcome::AlreadyExists
        ));
        assert_eq!(c.feed_sources().len(), 1);
    }

    #[tokio::test]
    async fn test_add_feed_source_rejects_invalid_url() {
        let mut c = test_controller().await;
        let err = c.add_feed_source("ftp://example.com/feed", "x").await.unwrap_err();
        assert!(matches!(err, AddFeedError::InvalidUrl(_)));
        let err = c.add_feed_source("   ", "x").await.unwrap_err();
        assert!(matches!(err, AddFeedError::InvalidUrl(UrlValidationError::Empty)));
        assert!(c.feed_sources().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_current_filter_targets_selected_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel><item><title>A</title><link>https://a.example/1</link></item></channel></rss>"#,
            ))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut c = test_controller().await;
        let a = seed(&mut c, &format!("{}/a", server.uri()), &[]).await;
        seed(&mut c, &format!("{}/b", server.uri()), &[]).await;

        c.select_filter(Filter::Feed(a));
        let summary = c.refresh_current_filter().await.unwrap();
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.new_items(), 1);

        c.select_filter(Filter::All);
        let summary = c.refresh_current_filter().await.unwrap();
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.new_items(), 0);
        assert!(summary
            .failures()
            .all(|r| matches!(r.result, Err(FetchError::HttpStatus(500)))));
        assert_eq!(c.all_count(), 1);
    }

    #[tokio::test]
    async fn test_reloaded_timeout_applies_to_next_refresh() {
        let server = MockServer::start().await;
        slow_feed(&server, "/slow", std::time::Duration::from_secs(2)).await;

        let mut c = controller_with(Settings {
            fetch_timeout_secs: 1,
            ..Settings::default()
        })
        .await;
        seed(&mut c, &format!("{}/slow", server.uri()), &[]).await;

        let summary = c.refresh_all_feeds().await.unwrap();
        assert!(matches!(summary.reports[0].result, Err(FetchError::Timeout(1))));

        c.set_settings(Settings {
            fetch_timeout_secs: 5,
            ..Settings::default()
        });
        let summary = c.refresh_all_feeds().await.unwrap();
        assert_eq!(summary.reports.len(), 1);
        assert!(matches!(summary.reports[0].result, Ok(1)));
        assert_eq!(c.all_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_clears_loading() {
        let server = MockServer::start().await;
        slow_feed(&server, "/slow", std::time::Duration::from_secs(3)).await;

        let mut c = test_controller().await;
        seed(&mut c, &format!("{}/slow", server.uri()), &[]).await;

        let cancelled =
            tokio::time::timeout(std::time::Duration::from_millis(100), c.refresh_all_feeds()).await;
        assert!(cancelled.is_err());
        assert!(!c.is_loading());
        assert_eq!(c.all_count(), 0);
    }
}
