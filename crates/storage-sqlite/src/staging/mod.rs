//! Per-job write buffer backed by its own SQLite file.

mod factory;
mod model;
mod schema;
mod store;

pub use factory::SqliteStagingFactory;
pub use store::SqliteStagingStore;
