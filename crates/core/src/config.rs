//! Price sync configuration and its defaults.

use std::time::Duration;

use crate::errors::{Error, Result};

/// Products queried concurrently within one collection batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause between collection batches, bounding the external request rate.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 500;

/// Concurrent workers used when draining the staging store.
pub const DEFAULT_IMPORT_WORKERS: usize = 4;

/// Staged rows read per import page.
pub const DEFAULT_IMPORT_PAGE_SIZE: usize = 1000;

/// Import progress is reported each time this many rows have been processed.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 5000;

/// Days a staging file is kept after a successful import, for manual reimport.
pub const DEFAULT_STAGING_RETENTION_DAYS: i64 = 7;

/// Days a snapshot is kept before the cleanup task deletes it.
pub const DEFAULT_SNAPSHOT_RETENTION_DAYS: i64 = 7;

/// Snapshot identifiers created by this pipeline start with this prefix.
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "price-sync";

/// Window within which two records with the same key count as duplicates.
pub const DUPLICATE_WINDOW_HOURS: i64 = 24;

/// Jobs of any type running concurrently in one process.
pub const DEFAULT_JOB_CONCURRENCY: usize = 4;

/// Tunables of one price sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSyncConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub import_workers: usize,
    pub import_page_size: usize,
    pub progress_interval: usize,
    pub check_existing: bool,
    pub staging_retention_days: i64,
    pub snapshot_retention_days: i64,
    pub snapshot_prefix: String,
}

impl Default for PriceSyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            import_workers: DEFAULT_IMPORT_WORKERS,
            import_page_size: DEFAULT_IMPORT_PAGE_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            check_existing: true,
            staging_retention_days: DEFAULT_STAGING_RETENTION_DAYS,
            snapshot_retention_days: DEFAULT_SNAPSHOT_RETENTION_DAYS,
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

impl PriceSyncConfig {
    /// Reject values that would stall or divide by zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfigValue("batch_size must be > 0".into()));
        }
        if self.import_workers == 0 {
            return Err(Error::InvalidConfigValue("import_workers must be > 0".into()));
        }
        if self.import_page_size == 0 {
            return Err(Error::InvalidConfigValue(
                "import_page_size must be > 0".into(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(Error::InvalidConfigValue(
                "progress_interval must be > 0".into(),
            ));
        }
        if self.staging_retention_days < 0 || self.snapshot_retention_days < 0 {
            return Err(Error::InvalidConfigValue(
                "retention days must not be negative".into(),
            ));
        }
        Ok(())
    }
}
