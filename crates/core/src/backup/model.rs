//! Snapshot domain models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form labels attached to a snapshot (job id, counts).
pub type SnapshotTags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Creating,
    Available,
    Failed,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Creating => "creating",
            SnapshotStatus::Available => "available",
            SnapshotStatus::Failed => "failed",
        }
    }
}

/// A point-in-time copy of the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub status: SnapshotStatus,
    pub tags: SnapshotTags,
    pub created_at: DateTime<Utc>,
}

/// What the backup phase did, as recorded on the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created {
        snapshot_id: String,
        status: SnapshotStatus,
    },
    Skipped {
        reason: String,
    },
}

impl BackupOutcome {
    /// Value stored in the job summary's backup status.
    pub fn status_label(&self) -> &'static str {
        match self {
            BackupOutcome::Created { status, .. } => status.as_str(),
            BackupOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        match self {
            BackupOutcome::Created { snapshot_id, .. } => Some(snapshot_id),
            BackupOutcome::Skipped { .. } => None,
        }
    }
}
