//! Staging store traits.

use std::sync::Arc;

use async_trait::async_trait;

use super::model::StagingStats;
use crate::errors::Result;
use crate::prices::StagedObservation;

/// Append-only buffer owned by exactly one job.
///
/// Writes never fail the caller: a rejected write is logged by the
/// implementation and reported through the return value. The record
/// counter only moves on a committed write.
#[async_trait]
pub trait StagingStore: Send + Sync {
    fn job_id(&self) -> &str;

    /// Appends one observation. Returns whether it was stored.
    async fn insert(&self, observation: &StagedObservation) -> bool;

    /// Appends all observations in one transaction. Returns how many were
    /// stored (all or none).
    async fn insert_batch(&self, observations: &[StagedObservation]) -> usize;

    /// Single-scan aggregate over the buffer.
    async fn stats(&self) -> Result<StagingStats>;

    /// Rows stored so far, from the in-memory counter.
    fn record_count(&self) -> u64;

    /// Rows `[offset, offset + limit)` in insertion order.
    async fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<StagedObservation>>;

    /// Releases the handle. `delete_now` removes the backing file;
    /// otherwise a positive `retention_days` leaves it in place with an
    /// expiry for later reimport. Failures are logged, never returned.
    async fn close(&self, delete_now: bool, retention_days: i64);
}

/// Opens staging stores by job id.
#[async_trait]
pub trait StagingStoreFactory: Send + Sync {
    /// Creates a fresh store for a new job.
    async fn create(&self, job_id: &str) -> Result<Arc<dyn StagingStore>>;

    /// Re-attaches to a store retained by an earlier run.
    /// Returns `Error::NotFound` when no file exists for the job.
    async fn reopen(&self, job_id: &str) -> Result<Arc<dyn StagingStore>>;

    /// Whether a backing file exists for the job.
    fn exists(&self, job_id: &str) -> bool;
}
