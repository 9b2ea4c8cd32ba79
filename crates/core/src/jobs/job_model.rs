//! Sync job domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::price_sync::PhaseDetail;

/// Most recent log lines kept on a job record.
pub const MAX_JOB_LOG_ENTRIES: usize = 200;

/// Status of a job. Every status but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Persisted status, progress and log aggregate of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: String,
    pub job_name: String,
    pub status: JobStatus,
    /// 0..=100
    pub progress: u8,
    pub detail: PhaseDetail,
    pub logs: Vec<JobLogEntry>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    /// A fresh running job waiting for a worker slot.
    pub fn new(job_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_name: job_name.to_string(),
            status: JobStatus::Running,
            progress: 0,
            detail: PhaseDetail::Queued,
            logs: Vec::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn push_log(&mut self, message: impl Into<String>) {
        self.logs.push(JobLogEntry {
            at: Utc::now(),
            message: message.into(),
        });
        if self.logs.len() > MAX_JOB_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_JOB_LOG_ENTRIES;
            self.logs.drain(..excess);
        }
        self.updated_at = Utc::now();
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.updated_at = Utc::now();
    }

    pub fn set_progress(&mut self, progress: u8, detail: PhaseDetail) {
        self.progress = progress.min(100);
        self.detail = detail;
        self.updated_at = Utc::now();
    }

    /// Moves the job into a terminal status. Refused (returns `false`) when
    /// the job already left `Running`, except for re-finishing a cancelled
    /// job as cancelled, which only refreshes its detail.
    pub fn finish(&mut self, status: JobStatus, detail: PhaseDetail) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let allowed = match self.status {
            JobStatus::Running => true,
            JobStatus::Cancelled => status == JobStatus::Cancelled && self.finished_at.is_none(),
            _ => false,
        };
        if !allowed {
            return false;
        }
        let now = Utc::now();
        self.status = status;
        self.detail = detail;
        if status == JobStatus::Completed {
            self.progress = 100;
        }
        self.finished_at = Some(now);
        self.updated_at = now;
        true
    }
}
