use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::feed::fetcher::{fetch_entries, FetchError};
use crate::feed::parser::ParseResult;
use crate::storage::{Database, FeedSource};

/// Limits applied to a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Maximum number of sources fetched at the same time (at least 1)
    pub max_concurrent: usize,
    /// Per-source bound on request plus body download
    pub timeout: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of refreshing a single source.
#[derive(Debug)]
pub struct RefreshReport {
    pub source_url: String,
    /// Number of new items stored, or why the refresh failed
    pub result: Result<usize, FetchError>,
}

/// Outcome of a refresh over one or more sources, one report per source.
///
/// Reports are in completion order, not input order.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub reports: Vec<RefreshReport>,
}

impl RefreshSummary {
    /// Total new items across all successful sources
    pub fn new_items(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .sum()
    }

    /// Reports whose refresh failed
    pub fn failures(&self) -> impl Iterator<Item = &RefreshReport> {
        self.reports.iter().filter(|r| r.result.is_err())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

impl From<RefreshReport> for RefreshSummary {
    fn from(report: RefreshReport) -> Self {
        Self {
            reports: vec![report],
        }
    }
}

/// Refreshes a single source and stores its new items.
///
/// Fetch failures are logged and returned in the report; they are never
/// retried here.
pub async fn refresh_one(
    db: &Database,
    client: &reqwest::Client,
    source: &FeedSource,
    options: RefreshOptions,
) -> RefreshReport {
    let fetched = fetch_entries(client, &source.url, options.timeout).await;
    store_fetched(db, source, fetched).await
}

/// Refreshes every source with bounded fan-out and a single writer.
///
/// Up to `options.max_concurrent` downloads run at once on a spawned task.
/// Each finished download is reconciled into the store by the calling task,
/// one at a time, so the store only ever sees one writer. Downloads keep
/// going while the writer is storing an earlier result. One source failing
/// does not affect the others. Returns once every source has finished.
pub async fn refresh_all(
    db: &Database,
    client: &reqwest::Client,
    sources: &[FeedSource],
    options: RefreshOptions,
) -> RefreshSummary {
    if sources.is_empty() {
        return RefreshSummary::default();
    }

    // Sized so the download task never waits on the writer
    let (tx, mut rx) = mpsc::channel(sources.len());
    let downloads = AbortOnDrop(tokio::spawn(download_all(
        client.clone(),
        sources.to_vec(),
        options,
        tx,
    )));

    let mut summary = RefreshSummary {
        reports: Vec::with_capacity(sources.len()),
    };
    while let Some((source, fetched)) = rx.recv().await {
        summary.reports.push(store_fetched(db, &source, fetched).await);
    }
    drop(downloads);

    tracing::info!(
        sources = sources.len(),
        new_items = summary.new_items(),
        failed = summary.failure_count(),
        "Refresh finished"
    );
    summary
}

type Downloaded = (FeedSource, Result<ParseResult, FetchError>);

async fn download_all(
    client: reqwest::Client,
    sources: Vec<FeedSource>,
    options: RefreshOptions,
    tx: mpsc::Sender<Downloaded>,
) {
    let timeout = options.timeout;
    let mut downloads = stream::iter(sources)
        .map(|source| {
            let client = client.clone();
            async move {
                let fetched = fetch_entries(&client, &source.url, timeout).await;
                (source, fetched)
            }
        })
        .buffer_unordered(options.max_concurrent.max(1));

    while let Some(done) = downloads.next().await {
        if tx.send(done).await.is_err() {
            break;
        }
    }
}

/// Aborts the download task when a refresh is cancelled.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn store_fetched(
    db: &Database,
    source: &FeedSource,
    fetched: Result<ParseResult, FetchError>,
) -> RefreshReport {
    let result = match fetched {
        Ok(parsed) => db
            .reconcile_entries(&source.url, &parsed.entries)
            .await
            .map_err(|e| FetchError::Database(e.to_string())),
        Err(e) => Err(e),
    };

    match &result {
        Ok(count) => tracing::debug!(feed = %source.url, new_items = count, "Feed refreshed"),
        Err(e) => tracing::warn!(feed = %source.url, name = %source.name, error = %e, "Feed refresh failed"),
    }

    RefreshReport {
        source_url: source.url.clone(),
        result,
    }
}
