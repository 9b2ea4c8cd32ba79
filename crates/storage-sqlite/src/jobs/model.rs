//! Database model for sync job records.
//!
//! Detail, logs and errors are stored as JSON text. The detail column is
//! decoded back into the typed phase enum on read, so a row written with an
//! unknown phase surfaces as an error rather than untyped data.

use diesel::prelude::*;

use pricewatch_core::errors::{DatabaseError, Error, Result};
use pricewatch_core::jobs::{JobStatus, SyncJob};

use crate::errors::IntoCore;
use crate::utils::{parse_db_timestamp, to_db_timestamp};

#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::sync_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncJobDB {
    pub id: String,
    pub job_name: String,
    pub status: String,
    pub progress: i32,
    pub detail: String,
    pub logs: String,
    pub errors: String,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
}

impl TryFrom<&SyncJob> for SyncJobDB {
    type Error = Error;

    fn try_from(job: &SyncJob) -> Result<Self> {
        Ok(SyncJobDB {
            id: job.id.clone(),
            job_name: job.job_name.clone(),
            status: job.status.as_str().to_string(),
            progress: i32::from(job.progress),
            detail: serde_json::to_string(&job.detail).into_core()?,
            logs: serde_json::to_string(&job.logs).into_core()?,
            errors: serde_json::to_string(&job.errors).into_core()?,
            created_at: to_db_timestamp(&job.created_at),
            updated_at: to_db_timestamp(&job.updated_at),
            finished_at: job.finished_at.as_ref().map(to_db_timestamp),
        })
    }
}

pub(crate) fn parse_status(value: &str) -> Result<JobStatus> {
    value
        .parse::<JobStatus>()
        .map_err(|e| Error::Database(DatabaseError::Internal(e)))
}

impl TryFrom<SyncJobDB> for SyncJob {
    type Error = Error;

    fn try_from(db: SyncJobDB) -> Result<Self> {
        Ok(SyncJob {
            status: parse_status(&db.status)?,
            progress: db.progress.clamp(0, 100) as u8,
            detail: serde_json::from_str(&db.detail).into_core()?,
            logs: serde_json::from_str(&db.logs).into_core()?,
            errors: serde_json::from_str(&db.errors).into_core()?,
            created_at: parse_db_timestamp(&db.created_at)?,
            updated_at: parse_db_timestamp(&db.updated_at)?,
            finished_at: db
                .finished_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            id: db.id,
            job_name: db.job_name,
        })
    }
}
