//! Pricewatch Core - price synchronization pipeline.
//!
//! Pulls price observations for known products from an external source,
//! resolves each observed seller to a catalog market, buffers matched
//! observations in a per-job staging store, drains them into the primary
//! store and finally requests a snapshot.
//!
//! This crate is database-agnostic: it defines the store traits that the
//! `storage-sqlite` crate implements.

pub mod backup;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod import;
pub mod jobs;
pub mod matching;
pub mod price_sync;
pub mod prices;
pub mod staging;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::PriceSyncConfig;
pub use price_sync::{PriceSyncDeps, PriceSyncOutcome, PriceSyncService};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
