//! Price synchronization job: collect observations from the external
//! source, stage matched ones, import them and snapshot the primary store.

mod client;
mod detail;
mod errors;
mod service;


pub use client::{PriceSource, PriceSourceClient, SourceObservation};
pub use detail::{MarketSummary, PhaseDetail, PriceSyncSummary};
pub use errors::PriceSourceError;
pub use service::{PriceSyncDeps, PriceSyncOutcome, PriceSyncService};
