use std::sync::Arc;

use log::warn;

use super::job_model::JobStatus;
use super::job_traits::SyncJobStore;

/// Cooperative cancellation: re-reads the job's stored status at each
/// checkpoint. There is no signal; in-flight work always finishes.
#[derive(Clone)]
pub struct CancellationToken {
    store: Arc<dyn SyncJobStore>,
    job_id: String,
}

impl CancellationToken {
    pub fn new(store: Arc<dyn SyncJobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    /// A failed read counts as "not cancelled".
    pub fn is_cancelled(&self) -> bool {
        match self.store.get_status(&self.job_id) {
            Ok(Some(status)) => status == JobStatus::Cancelled,
            Ok(None) => false,
            Err(e) => {
                warn!("Cancellation check for job {} failed: {}", self.job_id, e);
                false
            }
        }
    }
}
