use async_trait::async_trait;

use super::model::{Snapshot, SnapshotTags};
use crate::errors::Result;

/// Snapshot facility of the hosting database service.
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Requests a snapshot named under `prefix` and returns without waiting
    /// for it to become available.
    async fn create_snapshot(&self, prefix: &str, tags: &SnapshotTags) -> Result<Snapshot>;

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>>;

    /// Snapshots whose id starts with `prefix`, oldest first.
    async fn list_snapshots(&self, prefix: &str) -> Result<Vec<Snapshot>>;

    async fn delete_snapshot(&self, id: &str) -> Result<()>;
}
