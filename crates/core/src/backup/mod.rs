//! Post-import snapshot of the primary store plus retention pruning.

mod coordinator;
mod model;
mod service;

pub use coordinator::BackupCoordinator;
pub use model::{BackupOutcome, Snapshot, SnapshotStatus, SnapshotTags};
pub use service::SnapshotService;
