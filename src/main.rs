use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use rssbar::app::{AddFeedError, AddFeedOutcome, AppContext, FeedController, Filter};
use rssbar::config::{PollingInterval, Settings};
use rssbar::daemon;
use rssbar::feed::RefreshSummary;
use rssbar::storage::{Database, DatabaseError, FeedItem, ItemSort};

const DB_FILE: &str = "rssbar.db";
const SETTINGS_FILE: &str = "config.toml";

/// Data directory: `--data-dir`, then `RSSBAR_DIR`, then `~/.config/rssbar/`
fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os("RSSBAR_DIR").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rssbar"))
}

#[derive(Parser, Debug)]
#[command(name = "rssbar", version, about = "RSS/Atom reader that never resurrects deleted articles")]
struct Cli {
    /// Directory holding the database and settings file
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long, global = true)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscribed feeds with unread counts
    Feeds,
    /// Subscribe to a feed and fetch it once
    Add { url: String, name: String },
    /// Rename a feed
    Rename { url: String, name: String },
    /// Unsubscribe from a feed, archiving its articles
    Remove { url: String },
    /// List articles
    List {
        #[command(flatten)]
        view: ViewArgs,
        /// Oldest articles first
        #[arg(long)]
        oldest_first: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Fetch new articles from one feed or all feeds
    Refresh {
        #[arg(long, value_name = "URL")]
        feed: Option<String>,
    },
    /// Mark an article as read
    Read { id: String },
    /// Flip an article's read state
    Toggle { id: String },
    /// Mark every article in the selected view as read
    ReadAll {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Delete articles; they will not be fetched again
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete all read articles
    CleanRead,
    /// Delete articles published more than 30 days ago
    CleanOld,
    /// Delete every article
    Clear,
    /// Set the polling interval in minutes (5, 10, 15 or 30)
    SetInterval { minutes: u64 },
    /// Keep the reader window open when it loses focus
    SetKeepOpen {
        #[arg(action = clap::ArgAction::Set)]
        keep_open: bool,
    },
    /// Print current settings
    Settings,
    /// Poll feeds in the foreground until interrupted
    Run,
}

#[derive(Args, Debug)]
struct ViewArgs {
    #[arg(long, value_enum, default_value_t = FilterArg::All)]
    filter: FilterArg,
    /// Only articles from this feed url (overrides --filter)
    #[arg(long, value_name = "URL")]
    feed: Option<String>,
    /// Case-insensitive title search
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FilterArg {
    All,
    Unread,
    Read,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = resolve_data_dir(cli.data_dir)?;
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        tracing::info!(path = %data_dir.display(), "Created data directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %data_dir.display(),
                error = %e,
                "Failed to set data directory permissions to 0700"
            );
        }
    }

    let settings_path = data_dir.join(SETTINGS_FILE);
    let db_path = data_dir.join(DB_FILE);

    // Settings-only commands never open the store
    match &cli.command {
        Command::SetInterval { minutes } => {
            let mut settings = Settings::load(&settings_path)?;
            settings.polling_interval = PollingInterval::try_from(*minutes)?;
            settings.save(&settings_path)?;
            println!("Polling interval set to {}", settings.polling_interval);
            return Ok(());
        }
        Command::SetKeepOpen { keep_open } => {
            let mut settings = Settings::load(&settings_path)?;
            settings.keep_open = *keep_open;
            settings.save(&settings_path)?;
            println!("keep_open = {}", settings.keep_open);
            return Ok(());
        }
        Command::Settings => {
            let settings = Settings::load(&settings_path)?;
            print!("{}", toml::to_string_pretty(&settings)?);
            return Ok(());
        }
        _ => {}
    }

    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    if cli.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }
    let first_launch = !db_path.exists();

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    if settings.tombstone_retention_days > 0 {
        let days = i64::try_from(settings.tombstone_retention_days).unwrap_or(i64::MAX / 86_400);
        let before = Utc::now().timestamp().saturating_sub(days.saturating_mul(86_400));
        let pruned = db
            .prune_tombstones(before)
            .await
            .context("Failed to prune tombstones")?;
        if pruned > 0 {
            tracing::info!(pruned, days, "Pruned expired tombstones");
        }
    }

    let ctx = AppContext::new(db, settings).context("Failed to create HTTP client")?;
    let mut controller = FeedController::load(ctx)
        .await
        .context("Failed to load feeds")?;

    if first_launch {
        controller
            .add_default_feeds()
            .await
            .context("Failed to add default feeds")?;
    }

    execute(&mut controller, cli.command, &settings_path).await
}

async fn execute(c: &mut FeedController, command: Command, settings_path: &std::path::Path) -> Result<()> {
    match command {
        Command::Feeds => {
            for source in c.feed_sources() {
                println!("{:>4}  {}  <{}>", c.unread_count_for(source), source.name, source.url);
            }
            println!(
                "\n{} articles, {} unread, {} read",
                c.all_count(),
                c.unread_count(),
                c.read_count()
            );
        }
        Command::Add { url, name } => match c.add_feed_source(&url, &name).await {
            Ok(AddFeedOutcome::Added(report)) => match report.result {
                Ok(count) => println!("Added {} ({} new articles)", report.source_url, count),
                Err(e) => println!("Added {} (first fetch failed: {})", report.source_url, e),
            },
            Ok(AddFeedOutcome::AlreadyExists) => println!("Already subscribed to {}", url.trim()),
            Err(AddFeedError::InvalidUrl(e)) => anyhow::bail!("Invalid feed URL '{}': {}", url.trim(), e),
            Err(AddFeedError::Database(e)) => return Err(e).context("Failed to add feed"),
        },
        Command::Rename { url, name } => {
            c.rename_feed_source(&url, &name).await?;
            println!("Renamed {}", url);
        }
        Command::Remove { url } => {
            let source = find_source(c, &url)?;
            let removed = c.delete_feed(&source).await?;
            println!("Removed {} ({} articles archived)", source.name, removed);
        }
        Command::List {
            view,
            oldest_first,
            json,
        } => {
            if oldest_first {
                c.set_sort(ItemSort::OldestFirst).await?;
            }
            apply_view(c, view)?;
            let items = c.filtered_feed_items();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    print_item(item);
                }
                println!("\n{} of {} articles ({})", items.len(), c.all_count(), c.selected_filter().label());
            }
        }
        Command::Refresh { feed } => {
            let summary = match feed {
                Some(url) => {
                    let source = find_source(c, &url)?;
                    c.refresh_feed(&source).await?
                }
                None => c.refresh_all_feeds().await?,
            };
            print_summary(&summary);
        }
        Command::Read { id } => {
            let id = resolve_item_id(c, &id)?;
            c.mark_as_read(&id).await?;
        }
        Command::Toggle { id } => {
            let id = resolve_item_id(c, &id)?;
            let now_read = c.toggle_read_status(&id).await?;
            println!("{}", if now_read { "read" } else { "unread" });
        }
        Command::ReadAll { view } => {
            apply_view(c, view)?;
            let marked = c.mark_all_as_read().await?;
            println!("Marked {} articles as read", marked);
        }
        Command::Delete { ids } => {
            let mut items = Vec::with_capacity(ids.len());
            for id in &ids {
                let id = resolve_item_id(c, id)?;
                if let Some(item) = c.all_feed_items().iter().find(|i| i.id == id) {
                    items.push(item.clone());
                }
            }
            let deleted = c.archive_and_delete(&items).await?;
            println!("Deleted {} articles", deleted);
        }
        Command::CleanRead => {
            let deleted = c.clean_read_items().await?;
            println!("Deleted {} read articles", deleted);
        }
        Command::CleanOld => {
            let deleted = c.clean_old_items().await?;
            println!("Deleted {} old articles", deleted);
        }
        Command::Clear => {
            let deleted = c.clear_all_feed_items().await?;
            println!("Deleted {} articles", deleted);
        }
        Command::Run => daemon::run(c, settings_path).await?,
        // Handled before the store is opened
        Command::SetInterval { .. } | Command::SetKeepOpen { .. } | Command::Settings => {}
    }
    Ok(())
}

fn apply_view(c: &mut FeedController, view: ViewArgs) -> Result<()> {
    let filter = match (view.feed, view.filter) {
        (Some(url), _) => Filter::Feed(find_source(c, &url)?),
        (None, FilterArg::All) => Filter::All,
        (None, FilterArg::Unread) => Filter::Unread,
        (None, FilterArg::Read) => Filter::Read,
    };
    c.select_filter(filter);
    if let Some(search) = view.search {
        c.set_search_text(search);
    }
    Ok(())
}

fn find_source(c: &FeedController, url: &str) -> Result<rssbar::storage::FeedSource> {
    let url = url.trim();
    c.feed_sources()
        .iter()
        .find(|s| s.url == url)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No feed with url {}", url))
}

/// Accepts a full item id or a unique prefix of one.
fn resolve_item_id(c: &FeedController, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        anyhow::bail!("Empty article id");
    }
    let mut matches = c.all_feed_items().iter().filter(|i| i.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item.id.clone()),
        (None, _) => anyhow::bail!("No article with id {}", id),
        (Some(_), Some(_)) => anyhow::bail!("Article id {} is ambiguous", id),
    }
}

fn print_item(item: &FeedItem) {
    let marker = if item.is_read { ' ' } else { '*' };
    let date = item.pub_date.get(..10).unwrap_or("----------");
    println!("{} {}  {}  {}", marker, &item.id[..12.min(item.id.len())], date, item.title);
}

fn print_summary(summary: &RefreshSummary) {
    println!(
        "{} new articles from {} feeds",
        summary.new_items(),
        summary.reports.len()
    );
    for report in summary.failures() {
        if let Err(e) = &report.result {
            eprintln!("  {}: {}", report.source_url, e);
        }
    }
}
