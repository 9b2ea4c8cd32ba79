//! In-memory view of a running job, mirrored to the job store.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};

use super::job_model::{JobStatus, SyncJob};
use super::job_traits::SyncJobStore;
use crate::price_sync::PhaseDetail;

/// Owns the job record while a handler runs. Persistence failures are
/// logged and never interrupt the job.
pub struct JobReporter {
    store: Arc<dyn SyncJobStore>,
    job: Mutex<SyncJob>,
}

impl JobReporter {
    pub fn new(store: Arc<dyn SyncJobStore>, job: SyncJob) -> Self {
        Self {
            store,
            job: Mutex::new(job),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncJob> {
        self.job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn job_id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn snapshot(&self) -> SyncJob {
        self.lock().clone()
    }

    /// Appends a job-visible log line (not persisted until the next update).
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        let mut job = self.lock();
        info!("[job {}] {}", job.id, message);
        job.push_log(message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        let mut job = self.lock();
        warn!("[job {}] {}", job.id, message);
        job.push_error(message);
    }

    /// Records progress and persists the record.
    pub async fn update(&self, progress: u8, detail: PhaseDetail) {
        let job = {
            let mut job = self.lock();
            job.set_progress(progress, detail);
            job.clone()
        };
        if let Err(e) = self.store.save_progress(&job).await {
            error!("Failed to persist progress of job {}: {}", job.id, e);
        }
    }

    /// Persists logs and errors without changing progress.
    pub async fn flush(&self) {
        let job = self.snapshot();
        if let Err(e) = self.store.save_progress(&job).await {
            error!("Failed to persist job {}: {}", job.id, e);
        }
    }

    /// Moves the job into `status`. Returns `false` when the transition was
    /// refused in memory or by the store.
    pub async fn finish(&self, status: JobStatus, detail: PhaseDetail) -> bool {
        let job = {
            let mut job = self.lock();
            if !job.finish(status, detail) {
                return false;
            }
            job.clone()
        };
        match self.store.finish(&job).await {
            Ok(changed) => {
                if !changed {
                    // The stored row moved on (e.g. cancelled externally).
                    if let Ok(Some(stored)) = self.store.get_status(&job.id) {
                        let mut current = self.lock();
                        current.status = stored;
                        current.finished_at = None;
                    }
                }
                changed
            }
            Err(e) => {
                error!("Failed to finish job {}: {}", job.id, e);
                false
            }
        }
    }
}
