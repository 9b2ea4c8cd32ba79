//! Job records, cooperative cancellation and the bounded job runner.

mod cancellation;
mod job_model;
mod job_traits;
mod reporter;
mod runner;

pub use cancellation::CancellationToken;
pub use job_model::*;
pub use job_traits::{JobHandler, SyncJobStore};
pub use reporter::JobReporter;
pub use runner::JobRunner;

/// Name under which the price sync handler is registered.
pub const PRICE_SYNC_JOB: &str = "price-sync";
