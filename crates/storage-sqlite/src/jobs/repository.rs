//! Repository for sync job records.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use pricewatch_core::errors::Result;
use pricewatch_core::jobs::{JobStatus, SyncJob, SyncJobStore};

use super::model::{parse_status, SyncJobDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::sync_jobs;
use crate::utils::to_db_timestamp;

pub struct SyncJobRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncJobRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncJobStore for SyncJobRepository {
    async fn create(&self, job: &SyncJob) -> Result<()> {
        let row = SyncJobDB::try_from(job)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_jobs::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn get_by_id(&self, id: &str) -> Result<Option<SyncJob>> {
        let mut conn = get_connection(&self.pool)?;

        let row = sync_jobs::table
            .find(id)
            .select(SyncJobDB::as_select())
            .first::<SyncJobDB>(&mut conn)
            .optional()
            .into_core()?;

        row.map(SyncJob::try_from).transpose()
    }

    fn list_recent(&self, limit: i64) -> Result<Vec<SyncJob>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = sync_jobs::table
            .order(sync_jobs::created_at.desc())
            .limit(limit.max(0))
            .select(SyncJobDB::as_select())
            .load::<SyncJobDB>(&mut conn)
            .into_core()?;

        rows.into_iter().map(SyncJob::try_from).collect()
    }

    fn get_status(&self, id: &str) -> Result<Option<JobStatus>> {
        let mut conn = get_connection(&self.pool)?;

        let status = sync_jobs::table
            .find(id)
            .select(sync_jobs::status)
            .first::<String>(&mut conn)
            .optional()
            .into_core()?;

        status.as_deref().map(parse_status).transpose()
    }

    async fn save_progress(&self, job: &SyncJob) -> Result<()> {
        let row = SyncJobDB::try_from(job)?;
        self.writer
            .exec(move |conn| {
                diesel::update(sync_jobs::table.find(&row.id))
                    .set((
                        sync_jobs::progress.eq(row.progress),
                        sync_jobs::detail.eq(&row.detail),
                        sync_jobs::logs.eq(&row.logs),
                        sync_jobs::errors.eq(&row.errors),
                        sync_jobs::updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    async fn finish(&self, job: &SyncJob) -> Result<bool> {
        if !job.status.is_terminal() {
            return Ok(false);
        }
        let row = SyncJobDB::try_from(job)?;
        let finished_at = row
            .finished_at
            .clone()
            .unwrap_or_else(|| to_db_timestamp(&Utc::now()));
        let recancel = job.status == JobStatus::Cancelled;

        self.writer
            .exec(move |conn| {
                let running = JobStatus::Running.as_str();
                let cancelled = JobStatus::Cancelled.as_str();

                // A running job may finish in any terminal status; a job
                // flagged cancelled may only record its cancelled summary once.
                let mut target = sync_jobs::table
                    .filter(sync_jobs::id.eq(&row.id))
                    .into_boxed();
                target = if recancel {
                    target.filter(
                        sync_jobs::status.eq(running).or(sync_jobs::status
                            .eq(cancelled)
                            .and(sync_jobs::finished_at.is_null())),
                    )
                } else {
                    target.filter(sync_jobs::status.eq(running))
                };
                let ids: Vec<String> = target
                    .select(sync_jobs::id)
                    .load(conn)
                    .into_core()?;
                if ids.is_empty() {
                    return Ok(false);
                }

                diesel::update(sync_jobs::table.find(&row.id))
                    .set((
                        sync_jobs::status.eq(&row.status),
                        sync_jobs::progress.eq(row.progress),
                        sync_jobs::detail.eq(&row.detail),
                        sync_jobs::logs.eq(&row.logs),
                        sync_jobs::errors.eq(&row.errors),
                        sync_jobs::updated_at.eq(&row.updated_at),
                        sync_jobs::finished_at.eq(Some(finished_at)),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(true)
            })
            .await
    }

    async fn request_cancel(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let changed = diesel::update(
                    sync_jobs::table
                        .filter(sync_jobs::id.eq(&id))
                        .filter(sync_jobs::status.eq(JobStatus::Running.as_str())),
                )
                .set((
                    sync_jobs::status.eq(JobStatus::Cancelled.as_str()),
                    sync_jobs::updated_at.eq(to_db_timestamp(&Utc::now())),
                ))
                .execute(conn)
                .into_core()?;
                Ok(changed > 0)
            })
            .await
    }

    async fn append_log(&self, id: &str, message: &str) -> Result<bool> {
        let id = id.to_string();
        let message = message.to_string();
        self.writer
            .exec(move |conn| {
                // Read and rewrite inside the writer's transaction so a
                // concurrent save cannot interleave.
                let Some(row) = sync_jobs::table
                    .find(&id)
                    .select(SyncJobDB::as_select())
                    .first::<SyncJobDB>(conn)
                    .optional()
                    .into_core()?
                else {
                    return Ok(false);
                };
                let mut job = SyncJob::try_from(row)?;
                job.push_log(message);
                let row = SyncJobDB::try_from(&job)?;

                diesel::update(sync_jobs::table.find(&id))
                    .set((
                        sync_jobs::logs.eq(&row.logs),
                        sync_jobs::updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(true)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::setup;
    use pricewatch_core::price_sync::{PhaseDetail, PriceSyncSummary};

    fn repo() -> (tempfile::TempDir, SyncJobRepository) {
        let (dir, pool, writer, _) = setup();
        (dir, SyncJobRepository::new(pool, writer))
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (_dir, repo) = repo();
        let mut job = SyncJob::new("price-sync");
        job.push_log("queued");
        repo.create(&job).await.unwrap();

        let loaded = repo.get_by_id(&job.id).unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.detail, PhaseDetail::Queued);
        assert_eq!(loaded.logs.len(), 1);
        assert_eq!(repo.get_status(&job.id).unwrap(), Some(JobStatus::Running));
        assert!(repo.get_by_id("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_progress_never_touches_status() {
        let (_dir, repo) = repo();
        let mut job = SyncJob::new("price-sync");
        repo.create(&job).await.unwrap();
        assert!(repo.request_cancel(&job.id).await.unwrap());

        job.set_progress(40, PhaseDetail::Init);
        repo.save_progress(&job).await.unwrap();

        let loaded = repo.get_by_id(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Cancelled);
        assert_eq!(loaded.progress, 40);
        assert_eq!(loaded.detail, PhaseDetail::Init);
    }

    #[tokio::test]
    async fn test_finish_is_one_way() {
        let (_dir, repo) = repo();
        let mut job = SyncJob::new("price-sync");
        repo.create(&job).await.unwrap();

        job.finish(
            JobStatus::Completed,
            PhaseDetail::Completed(PriceSyncSummary::default()),
        );
        assert!(repo.finish(&job).await.unwrap());

        let mut late = job.clone();
        late.status = JobStatus::Failed;
        late.detail = PhaseDetail::Failed {
            message: "late".into(),
        };
        assert!(!repo.finish(&late).await.unwrap());
        assert!(!repo.request_cancel(&job.id).await.unwrap());

        let loaded = repo.get_by_id(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.progress, 100);
        assert!(loaded.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_job_records_summary_once() {
        let (_dir, repo) = repo();
        let job = SyncJob::new("price-sync");
        repo.create(&job).await.unwrap();
        assert!(repo.request_cancel(&job.id).await.unwrap());
        assert!(!repo.request_cancel(&job.id).await.unwrap());

        let mut completed = job.clone();
        completed.finish(
            JobStatus::Completed,
            PhaseDetail::Completed(PriceSyncSummary::default()),
        );
        assert!(!repo.finish(&completed).await.unwrap());

        let mut cancelled = job.clone();
        cancelled.finish(
            JobStatus::Cancelled,
            PhaseDetail::Cancelled(PriceSyncSummary::default()),
        );
        assert!(repo.finish(&cancelled).await.unwrap());
        assert!(!repo.finish(&cancelled).await.unwrap());

        let loaded = repo.get_by_id(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Cancelled);
        assert!(matches!(loaded.detail, PhaseDetail::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_append_log_keeps_existing_lines_and_status() {
        let (_dir, repo) = repo();
        let mut job = SyncJob::new("price-sync");
        job.push_log("first");
        repo.create(&job).await.unwrap();
        job.finish(
            JobStatus::Completed,
            PhaseDetail::Completed(PriceSyncSummary::default()),
        );
        assert!(repo.finish(&job).await.unwrap());

        assert!(repo.append_log(&job.id, "Reimport: 1 imported").await.unwrap());
        assert!(!repo.append_log("missing", "nothing").await.unwrap());

        let loaded = repo.get_by_id(&job.id).unwrap().unwrap();
        let lines: Vec<&str> = loaded.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(lines, vec!["first", "Reimport: 1 imported"]);
        assert_eq!(loaded.status, JobStatus::Completed);
        assert!(matches!(loaded.detail, PhaseDetail::Completed(_)));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let (_dir, repo) = repo();
        let mut ids = Vec::new();
        for minutes in [30, 20, 10] {
            let mut job = SyncJob::new("price-sync");
            job.created_at = Utc::now() - chrono::Duration::minutes(minutes);
            repo.create(&job).await.unwrap();
            ids.push(job.id);
        }

        let recent = repo.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, ids[2]);
        assert_eq!(recent[1].id, ids[1]);
    }

    #[tokio::test]
    async fn test_unknown_phase_is_rejected_on_read() {
        let (_dir, pool, writer, _) = setup();
        let repo = SyncJobRepository::new(pool, writer.clone());
        let job = SyncJob::new("price-sync");
        repo.create(&job).await.unwrap();

        let id = job.id.clone();
        writer
            .exec(move |conn| {
                diesel::update(sync_jobs::table.find(&id))
                    .set(sync_jobs::detail.eq(r#"{"phase":"teleporting"}"#))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(repo.get_by_id(&job.id).is_err());
    }
}
