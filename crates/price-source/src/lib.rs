//! Pricewatch Price Source Crate
//!
//! Client side of the external price-discovery API: one HTTP query per product
//! barcode, decoded into validated [`Observation`]s.
//!
//! # Overview
//!
//! ```text
//! barcode ──► SearchParams ──► PriceProvider ──► raw JSON
//!                                                   │
//!                                         decode + validate
//!                                                   │
//!                                                   ▼
//!                                         Vec<Observation>
//! ```
//!
//! Malformed entries are dropped at the boundary with a warning; a response
//! whose overall shape is wrong is rejected as
//! [`PriceSourceError::InvalidResponse`].

pub mod config;
pub mod errors;
pub mod models;
pub mod provider;

pub use config::PriceSourceConfig;
pub use errors::PriceSourceError;
pub use models::{Establishment, Observation, SearchParams};
pub use provider::{MenorPrecoProvider, PriceProvider};
