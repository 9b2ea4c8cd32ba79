//! SQLite storage implementation for Pricewatch.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `pricewatch-core` and contains:
//! - Connection pooling and the single writer actor for the primary store
//! - Diesel migrations
//! - Repositories for markets, products, price records and sync jobs
//! - The per-job staging store (one SQLite file per job)
//! - A file-based snapshot service
//!
//! ```text
//!        core (domain, traits)
//!                │
//!                ▼
//!     storage-sqlite (this crate)
//!        │               │
//!        ▼               ▼
//!   primary DB     staging_<job>.db files
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod catalog;
pub mod jobs;
pub mod prices;
pub mod snapshots;
pub mod staging;

// Re-export database utilities
pub use db::{
    create_pool, create_pool_with_size, get_connection, init, run_migrations, spawn_writer,
    DbConnection, DbPool, WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use catalog::{MarketRepository, ProductRepository};
pub use jobs::SyncJobRepository;
pub use prices::PriceRecordRepository;
pub use snapshots::FileSnapshotService;
pub use staging::{SqliteStagingFactory, SqliteStagingStore};

pub use pricewatch_core::errors::{DatabaseError, Error, Result};
