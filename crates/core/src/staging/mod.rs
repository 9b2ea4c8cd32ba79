//! Write buffer: a per-job local store absorbing observations during
//! collection, drained into the primary store afterwards.

mod model;
mod store;

pub use model::{staging_file_name, StagingStats};
pub use store::{StagingStore, StagingStoreFactory};
