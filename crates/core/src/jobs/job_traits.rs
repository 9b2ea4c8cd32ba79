//! Job persistence and handler traits.

use async_trait::async_trait;
use serde_json::Value;

use super::job_model::{JobStatus, SyncJob};
use crate::errors::Result;

/// Persistence for job records. Readable by the status API while a job runs.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    async fn create(&self, job: &SyncJob) -> Result<()>;

    fn get_by_id(&self, id: &str) -> Result<Option<SyncJob>>;

    /// Most recently created first.
    fn list_recent(&self, limit: i64) -> Result<Vec<SyncJob>>;

    /// Current status only; polled for cancellation.
    fn get_status(&self, id: &str) -> Result<Option<JobStatus>>;

    /// Writes progress, detail, logs and errors. Never touches status.
    async fn save_progress(&self, job: &SyncJob) -> Result<()>;

    /// Writes the terminal status and detail of `job`, guarded the same way
    /// as [`SyncJob::finish`] against the stored status. Returns whether the
    /// row changed.
    async fn finish(&self, job: &SyncJob) -> Result<bool>;

    /// Flags a running job as cancelled. Returns `false` when the job is
    /// unknown or already terminal.
    async fn request_cancel(&self, id: &str) -> Result<bool>;

    /// Appends one line to the stored logs without rewriting the rest of the
    /// record. Returns `false` when the job is unknown.
    async fn append_log(&self, id: &str, message: &str) -> Result<bool>;
}

/// Executes one kind of job once the runner grants it a slot.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the job to a terminal status. Never returns an error: every
    /// outcome is recorded on the job.
    async fn run(&self, job: SyncJob, payload: Value);
}
