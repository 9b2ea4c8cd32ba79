//! Bulk transfer from a job's staging store into the primary store.

mod engine;
mod model;


pub use engine::{partition_pages, ImportEngine};
pub use model::{ImportOptions, ImportProgress, ImportResult, ProgressCallback};
