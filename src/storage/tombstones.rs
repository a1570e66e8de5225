use sqlx::{QueryBuilder, Sqlite, Transaction};

use super::schema::Database;
use super::types::{DatabaseError, DeletedArticle, FeedItem};

/// Rows per multi-value statement; keeps well under SQLite's parameter limit.
const BATCH_SIZE: usize = 200;

/// Insert tombstones for `links` inside an open transaction.
///
/// Links that are already tombstoned are left untouched, so the same link
/// never gets two tombstones. Returns the number of new tombstones.
pub(crate) async fn archive_links(
    tx: &mut Transaction<'_, Sqlite>,
    links: &[String],
) -> Result<u64, DatabaseError> {
    if links.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut created = 0;

    for chunk in links.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT OR IGNORE INTO deleted_articles (link, deleted_at) ");
        builder.push_values(chunk, |mut b, link| {
            b.push_bind(link).push_bind(now);
        });
        created += builder.build().execute(&mut **tx).await?.rows_affected();
    }

    Ok(created)
}

impl Database {
    // ========================================================================
    // Archive (tombstone) Operations
    // ========================================================================

    /// Tombstone and delete the given items in one transaction.
    ///
    /// This is the only path that removes feed items: each item's link is
    /// archived first, so the fetcher will never re-insert it.
    ///
    /// # Returns
    ///
    /// The number of feed items actually deleted.
    pub async fn archive_and_delete(&self, items: &[FeedItem]) -> Result<usize, DatabaseError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut links: Vec<String> = items.iter().map(|i| i.link.clone()).collect();
        links.sort_unstable();
        links.dedup();

        let mut tx = self.pool.begin().await?;
        let archived = archive_links(&mut tx, &links).await?;

        let mut deleted: u64 = 0;
        for chunk in items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM feed_items WHERE id IN (");
            let mut separated = builder.separated(", ");
            for item in chunk {
                separated.push_bind(&item.id);
            }
            separated.push_unseparated(")");
            deleted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(
            requested = items.len(),
            archived = archived,
            deleted = deleted,
            "Archived and deleted feed items"
        );
        Ok(deleted as usize)
    }

    /// Whether a tombstone exists for `link`
    pub async fn is_tombstoned(&self, link: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM deleted_articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All tombstones, newest first
    pub async fn fetch_tombstones(&self) -> Result<Vec<DeletedArticle>, DatabaseError> {
        let rows = sqlx::query_as::<_, DeletedArticle>(
            "SELECT link, deleted_at FROM deleted_articles ORDER BY deleted_at DESC, link",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of tombstones
    pub async fn tombstone_count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM deleted_articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Remove tombstones created before `before` (unix seconds).
    ///
    /// Only called when a retention period is configured; by default
    /// tombstones are kept forever.
    pub async fn prune_tombstones(&self, before: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM deleted_articles WHERE deleted_at < ?")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
