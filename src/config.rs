//! Settings file parser for `<data dir>/config.toml`.
//!
//! The file is optional: a missing or empty file yields `Settings::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
//! Settings live outside the article store and are rewritten atomically.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::RefreshOptions;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Settings file exceeds maximum allowed size.
    #[error("Settings file too large: {0}")]
    TooLarge(String),

    #[error("Invalid polling interval: {0} minutes (allowed: 5, 10, 15, 30)")]
    InvalidInterval(u64),
}

// ============================================================================
// Polling Interval
// ============================================================================

/// How often the background poller refreshes every feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum PollingInterval {
    #[default]
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    ThirtyMinutes,
}

impl PollingInterval {
    pub const ALL: [PollingInterval; 4] = [
        PollingInterval::FiveMinutes,
        PollingInterval::TenMinutes,
        PollingInterval::FifteenMinutes,
        PollingInterval::ThirtyMinutes,
    ];

    pub fn minutes(self) -> u64 {
        match self {
            PollingInterval::FiveMinutes => 5,
            PollingInterval::TenMinutes => 10,
            PollingInterval::FifteenMinutes => 15,
            PollingInterval::ThirtyMinutes => 30,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.minutes() * 60)
    }
}

impl TryFrom<u64> for PollingInterval {
    type Error = ConfigError;

    fn try_from(minutes: u64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|i| i.minutes() == minutes)
            .ok_or(ConfigError::InvalidInterval(minutes))
    }
}

impl From<PollingInterval> for u64 {
    fn from(interval: PollingInterval) -> Self {
        interval.minutes()
    }
}

impl std::fmt::Display for PollingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} minutes", self.minutes())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// User-tunable settings.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Background refresh interval, one of 5/10/15/30 minutes.
    #[serde(rename = "polling_interval_minutes")]
    pub polling_interval: PollingInterval,

    /// Keep the reader window open when it loses focus.
    pub keep_open: bool,

    /// Show the desktop window in addition to the menubar item.
    pub show_in_menu_bar: bool,

    /// Maximum feeds downloaded at the same time during a full refresh.
    pub max_concurrent_fetches: usize,

    /// Per-feed download timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Drop tombstones older than this many days at startup. 0 keeps them forever.
    pub tombstone_retention_days: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            polling_interval: PollingInterval::default(),
            keep_open: false,
            show_in_menu_bar: true,
            max_concurrent_fetches: 8,
            fetch_timeout_secs: 30,
            tombstone_retention_days: 0,
        }
    }
}

impl Settings {
    /// Maximum settings file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "polling_interval_minutes",
        "keep_open",
        "show_in_menu_bar",
        "max_concurrent_fetches",
        "fetch_timeout_secs",
        "tombstone_retention_days",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Settings::default())`
    /// - Invalid TOML or a disallowed interval → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Settings file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Settings file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in settings file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            interval = settings.polling_interval.minutes(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Write settings to `path` atomically (temp file, fsync, rename).
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        let write_result = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&temp_path, path)
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }

        tracing::debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Refresh limits derived from these settings
    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            max_concurrent: self.max_concurrent_fetches.max(1),
            timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
