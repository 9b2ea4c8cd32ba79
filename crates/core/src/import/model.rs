//! Import engine models.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_IMPORT_PAGE_SIZE, DEFAULT_PROGRESS_INTERVAL};

/// Invoked from worker tasks; calls from different workers may interleave.
pub type ProgressCallback = Arc<dyn Fn(ImportProgress) + Send + Sync>;

/// Options for one drain.
#[derive(Clone)]
pub struct ImportOptions {
    /// Staged rows read per page.
    pub page_size: usize,
    /// Filter rows already present in the primary store within the
    /// duplicate window before inserting.
    pub check_existing: bool,
    /// Concurrent workers; `1` runs the sequential path.
    pub workers: usize,
    /// Rows processed between progress callbacks.
    pub progress_interval: usize,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_IMPORT_PAGE_SIZE,
            check_existing: true,
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            on_progress: None,
        }
    }
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("page_size", &self.page_size)
            .field("check_existing", &self.check_existing)
            .field("workers", &self.workers)
            .field("progress_interval", &self.progress_interval)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Running totals across all workers at the time of the callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub processed: u64,
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total: u64,
}

/// Outcome of a drain. `imported + skipped + errors == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total: u64,
}

impl ImportResult {
    pub fn accounted(&self) -> u64 {
        self.imported + self.skipped + self.errors
    }
}
