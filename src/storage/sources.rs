use super::schema::Database;
use super::tombstones::archive_links;
use super::types::{DatabaseError, FeedSource};

impl Database {
    // ========================================================================
    // Feed Source Operations
    // ========================================================================

    /// Get all feed sources sorted by name
    pub async fn fetch_feed_sources(&self) -> Result<Vec<FeedSource>, DatabaseError> {
        let sources = sqlx::query_as::<_, FeedSource>(
            "SELECT url, name FROM feed_sources ORDER BY name COLLATE NOCASE, url",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// Look up a single feed source by url
    pub async fn get_feed_source(&self, url: &str) -> Result<Option<FeedSource>, DatabaseError> {
        let source = sqlx::query_as::<_, FeedSource>(
            "SELECT url, name FROM feed_sources WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// Insert a feed source, returns `false` if the url is already subscribed.
    ///
    /// Callers check for duplicates first; `INSERT OR IGNORE` keeps a racing
    /// duplicate from replacing the existing name.
    pub async fn insert_feed_source(&self, url: &str, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("INSERT OR IGNORE INTO feed_sources (url, name) VALUES (?, ?)")
            .bind(url)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change the display name of a feed source
    pub async fn rename_feed_source(&self, url: &str, name: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE feed_sources SET name = ? WHERE url = ?")
            .bind(name)
            .bind(url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                kind: "feed source",
                key: url.to_string(),
            });
        }
        Ok(())
    }

    /// Delete a feed source and archive all of its items.
    ///
    /// Every item of the source is tombstoned before it is removed, so a later
    /// re-subscription does not bring the same articles back. Runs in a single
    /// transaction. Deleting an unknown url is a no-op.
    ///
    /// # Returns
    ///
    /// The number of feed items removed with the source.
    pub async fn delete_feed_source(&self, url: &str) -> Result<usize, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let links: Vec<(String,)> =
            sqlx::query_as("SELECT link FROM feed_items WHERE feed_source_url = ?")
                .bind(url)
                .fetch_all(&mut *tx)
                .await?;
        let links: Vec<String> = links.into_iter().map(|(l,)| l).collect();

        archive_links(&mut tx, &links).await?;

        let removed = sqlx::query("DELETE FROM feed_items WHERE feed_source_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM feed_sources WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(feed = %url, items_removed = removed, "Feed source deleted");
        Ok(removed as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, ItemPredicate, ItemSort, ParsedEntry};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn entry(link: &str) -> ParsedEntry {
        ParsedEntry {
            title: format!("Title {}", link),
            link: link.to_string(),
            pub_date: "2024-01-01T00:00:00Z".to_string(),
            summary: None,
            content: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_sorted_by_name() {
        let db = test_db().await;
        db.insert_feed_source("https://b.example/rss", "beta")
            .await
            .unwrap();
        db.insert_feed_source("https://a.example/rss", "Alpha")
            .await
            .unwrap();
        db.insert_feed_source("https://c.example/rss", "Gamma")
            .await
            .unwrap();

        let sources = db.fetch_feed_sources().await.unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "Gamma"]);
    }

    #[tokio::test]
    async fn test_insert_duplicate_url_is_rejected() {
        let db = test_db().await;
        assert!(db.insert_feed_source("https://x/rss", "First").await.unwrap());
        assert!(!db.insert_feed_source("https://x/rss", "Second").await.unwrap());

        let sources = db.fetch_feed_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "First");
    }

    #[tokio::test]
    async fn test_rename_feed_source() {
        let db = test_db().await;
        db.insert_feed_source("https://x/rss", "Old").await.unwrap();
        db.rename_feed_source("https://x/rss", "New").await.unwrap();

        let source = db.get_feed_source("https://x/rss").await.unwrap().unwrap();
        assert_eq!(source.name, "New");
    }

    #[tokio::test]
    async fn test_rename_unknown_source_is_not_found() {
        let db = test_db().await;
        let err = db.rename_feed_source("https://nope/rss", "X").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_feed_source_archives_items() {
        let db = test_db().await;
        db.insert_feed_source("https://x/rss", "X").await.unwrap();
        db.insert_feed_source("https://y/rss", "Y").await.unwrap();
        db.reconcile_entries("https://x/rss", &[entry("https://x/1"), entry("https://x/2")])
            .await
            .unwrap();
        db.reconcile_entries("https://y/rss", &[entry("https://y/1")])
            .await
            .unwrap();

        let removed = db.delete_feed_source("https://x/rss").await.unwrap();
        assert_eq!(removed, 2);

        let left = db
            .fetch_items(ItemPredicate::Source("https://x/rss"), ItemSort::NewestFirst)
            .await
            .unwrap();
        assert!(left.is_empty());
        assert!(db.is_tombstoned("https://x/1").await.unwrap());
        assert!(db.is_tombstoned("https://x/2").await.unwrap());
        assert!(!db.is_tombstoned("https://y/1").await.unwrap());

        let sources = db.fetch_feed_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://y/rss");
    }

    #[tokio::test]
    async fn test_delete_unknown_source_is_noop() {
        let db = test_db().await;
        assert_eq!(db.delete_feed_source("https://nope/rss").await.unwrap(), 0);
    }
}
