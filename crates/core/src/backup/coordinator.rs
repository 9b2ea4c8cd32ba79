//! Best-effort backup after an import.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use super::model::{BackupOutcome, Snapshot, SnapshotStatus, SnapshotTags};
use super::service::SnapshotService;
use crate::errors::{Error, Result};

pub struct BackupCoordinator {
    service: Arc<dyn SnapshotService>,
    prefix: String,
    retention_days: i64,
}

impl BackupCoordinator {
    pub fn new(service: Arc<dyn SnapshotService>, prefix: impl Into<String>, retention_days: i64) -> Self {
        Self {
            service,
            prefix: prefix.into(),
            retention_days,
        }
    }

    /// Requests a snapshot tagged with `tags`. Does not wait for it.
    pub async fn create_snapshot(&self, tags: &SnapshotTags) -> Result<Snapshot> {
        let snapshot = self.service.create_snapshot(&self.prefix, tags).await?;
        info!(
            "Snapshot {} requested (status {})",
            snapshot.id,
            snapshot.status.as_str()
        );
        Ok(snapshot)
    }

    /// Deletes snapshots under this prefix older than the retention window.
    /// Returns how many were deleted; individual delete failures are logged.
    pub async fn cleanup_old_snapshots(&self) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let snapshots = self.service.list_snapshots(&self.prefix).await?;

        let mut deleted = 0;
        for snapshot in snapshots.iter().filter(|s| s.created_at < cutoff) {
            match self.service.delete_snapshot(&snapshot.id).await {
                Ok(()) => {
                    debug!("Deleted expired snapshot {}", snapshot.id);
                    deleted += 1;
                }
                Err(e) => warn!("Failed to delete snapshot {}: {}", snapshot.id, e),
            }
        }
        Ok(deleted)
    }

    /// Runs the cleanup on a detached task. Its outcome is only logged.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.cleanup_old_snapshots().await {
                Ok(0) => debug!("No expired '{}' snapshots", this.prefix),
                Ok(n) => info!("Deleted {} expired '{}' snapshots", n, this.prefix),
                Err(e) => warn!("Snapshot cleanup failed: {}", e),
            }
        })
    }

    /// Snapshot then cleanup. Never fails: errors turn into `Skipped`.
    pub async fn run(self: &Arc<Self>, tags: &SnapshotTags) -> BackupOutcome {
        let outcome = match self.create_snapshot(tags).await {
            Ok(snapshot) => BackupOutcome::Created {
                snapshot_id: snapshot.id,
                status: snapshot.status,
            },
            Err(e) => {
                warn!("Backup skipped: {}", e);
                return BackupOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };
        self.spawn_cleanup();
        outcome
    }

    /// Polls until the snapshot is available. Not used on the job path.
    pub async fn wait_for_available(
        &self,
        id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Snapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.service.get_snapshot(id).await? {
                Some(s) if s.status == SnapshotStatus::Available => return Ok(s),
                Some(s) if s.status == SnapshotStatus::Failed => {
                    return Err(Error::Snapshot(format!("snapshot {} failed", id)));
                }
                Some(_) => {}
                None => return Err(Error::NotFound(format!("snapshot {}", id))),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Snapshot(format!(
                    "snapshot {} not available after {:?}",
                    id, timeout
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
