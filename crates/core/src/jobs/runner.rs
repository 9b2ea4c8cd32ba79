//! Bounded job runner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, error};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::job_model::{JobStatus, SyncJob};
use super::job_traits::{JobHandler, SyncJobStore};
use crate::errors::{Error, Result};
use crate::price_sync::PhaseDetail;

/// Runs jobs of any registered kind, at most `concurrency` at a time.
/// Jobs beyond the limit wait for a slot with status `running` and a
/// `queued` detail.
pub struct JobRunner {
    store: Arc<dyn SyncJobStore>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn SyncJobStore>, concurrency: usize) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.name(), handler);
        self
    }

    pub fn store(&self) -> Arc<dyn SyncJobStore> {
        self.store.clone()
    }

    /// Creates the job record and schedules the handler. The record exists
    /// by the time this returns.
    pub async fn enqueue(&self, job_name: &str, payload: Value) -> Result<SyncJob> {
        let handler = self
            .handlers
            .get(job_name)
            .cloned()
            .ok_or_else(|| Error::UnknownJob(job_name.to_string()))?;

        let job = SyncJob::new(job_name);
        self.store.create(&job).await?;
        debug!("Enqueued {} job {}", job_name, job.id);

        let permits = self.permits.clone();
        let store = self.store.clone();
        let queued = job.clone();
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        // Reap finished tasks so the set does not grow unbounded.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Job {} could not get a worker slot: {}", queued.id, e);
                    let mut failed = queued;
                    if failed.finish(
                        JobStatus::Failed,
                        PhaseDetail::Failed {
                            message: "job runner shut down".to_string(),
                        },
                    ) {
                        let _ = store.finish(&failed).await;
                    }
                    return;
                }
            };
            handler.run(queued, payload).await;
        });

        Ok(job)
    }

    /// Free worker slots right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for every scheduled job to finish.
    pub async fn wait_idle(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Job task aborted: {}", e);
            }
        }
    }
}
