use sha2::{Digest, Sha256};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;

use super::schema::Database;
use super::types::{DatabaseError, FeedItem, ItemPredicate, ItemSort, ParsedEntry};

/// Rows per multi-value statement (8 columns * 100 = 800 parameters)
const BATCH_SIZE: usize = 100;

const ITEM_COLUMNS: &str =
    "SELECT id, title, link, pub_date, feed_source_url, is_read, summary, content, fetched_at FROM feed_items";

/// Stable item id derived from the owning source and the article link.
pub fn item_id(feed_source_url: &str, link: &str) -> String {
    let hash = Sha256::digest(format!("{}|{}", feed_source_url, link).as_bytes());
    format!("{:x}", hash)
}

impl Database {
    // ========================================================================
    // Feed Item Queries
    // ========================================================================

    /// Fetch feed items matching `predicate`, ordered by `sort`
    pub async fn fetch_items(
        &self,
        predicate: ItemPredicate<'_>,
        sort: ItemSort,
    ) -> Result<Vec<FeedItem>, DatabaseError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ITEM_COLUMNS);

        match predicate {
            ItemPredicate::All => {}
            ItemPredicate::Source(url) => {
                builder.push(" WHERE feed_source_url = ");
                builder.push_bind(url);
            }
            ItemPredicate::Read(read) => {
                builder.push(" WHERE is_read = ");
                builder.push_bind(read);
            }
            ItemPredicate::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                builder.push(" WHERE id IN (");
                let mut separated = builder.separated(", ");
                for id in ids {
                    separated.push_bind(id);
                }
                separated.push_unseparated(")");
            }
        }
        builder.push(sort.order_by());

        let items = builder
            .build_query_as::<FeedItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Get a single feed item by id
    pub async fn get_item(&self, id: &str) -> Result<Option<FeedItem>, DatabaseError> {
        let item = sqlx::query_as::<_, FeedItem>(&format!("{} WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Merge freshly parsed entries for a source into the store.
    ///
    /// An entry is skipped when its link already exists for this source, when
    /// the link is tombstoned, or when an earlier entry in the same payload had
    /// the same link. The remaining entries are inserted unread, all in one
    /// transaction. If the source was removed while its fetch was in flight,
    /// nothing is inserted.
    ///
    /// # Returns
    ///
    /// The number of newly inserted items.
    pub async fn reconcile_entries(
        &self,
        feed_source_url: &str,
        entries: &[ParsedEntry],
    ) -> Result<usize, DatabaseError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let source: Option<(String,)> = sqlx::query_as("SELECT url FROM feed_sources WHERE url = ?")
            .bind(feed_source_url)
            .fetch_optional(&mut *tx)
            .await?;
        if source.is_none() {
            tracing::debug!(feed = %feed_source_url, "Source removed during fetch, dropping entries");
            return Ok(0);
        }

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT link FROM feed_items WHERE feed_source_url = ?")
                .bind(feed_source_url)
                .fetch_all(&mut *tx)
                .await?;
        let mut seen: HashSet<String> = existing.into_iter().map(|(l,)| l).collect();

        let mut tombstoned: HashSet<String> = HashSet::new();
        for chunk in entries.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT link FROM deleted_articles WHERE link IN (");
            let mut separated = builder.separated(", ");
            for entry in chunk {
                separated.push_bind(&entry.link);
            }
            separated.push_unseparated(")");
            let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&mut *tx).await?;
            tombstoned.extend(rows.into_iter().map(|(l,)| l));
        }

        let fresh: Vec<&ParsedEntry> = entries
            .iter()
            .filter(|e| !tombstoned.contains(&e.link))
            .filter(|e| seen.insert(e.link.clone()))
            .collect();

        let mut inserted: u64 = 0;
        for chunk in fresh.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO feed_items \
                 (id, title, link, pub_date, feed_source_url, is_read, summary, content, fetched_at) ",
            );
            builder.push_values(chunk, |mut b, entry| {
                b.push_bind(item_id(feed_source_url, &entry.link))
                    .push_bind(&entry.title)
                    .push_bind(&entry.link)
                    .push_bind(&entry.pub_date)
                    .push_bind(feed_source_url)
                    .push_bind(false)
                    .push_bind(&entry.summary)
                    .push_bind(&entry.content)
                    .push_bind(now);
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(
            feed = %feed_source_url,
            candidates = entries.len(),
            tombstoned = tombstoned.len(),
            inserted = inserted,
            "Reconciled feed entries"
        );
        Ok(inserted as usize)
    }

    // ========================================================================
    // Read State Mutations
    // ========================================================================

    /// Set the read flag on one item, returns whether anything changed
    pub async fn set_item_read(&self, id: &str, read: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE feed_items SET is_read = ? WHERE id = ? AND is_read != ?")
            .bind(read)
            .bind(id)
            .bind(read)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically flip the read flag, returning the new value
    pub async fn toggle_item_read(&self, id: &str) -> Result<bool, DatabaseError> {
        let row: Option<(bool,)> =
            sqlx::query_as("UPDATE feed_items SET is_read = NOT is_read WHERE id = ? RETURNING is_read")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(read,)| read).ok_or_else(|| DatabaseError::NotFound {
            kind: "feed item",
            key: id.to_string(),
        })
    }

    /// Mark the given items read in one transaction, returns count changed
    pub async fn mark_items_read(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for chunk in ids.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE feed_items SET is_read = 1 WHERE is_read = 0 AND id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            changed += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(changed)
    }
}
