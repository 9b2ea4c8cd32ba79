//! Price observations: staged (write buffer) and durable (primary store).

mod model;
mod store;

pub use model::{DuplicateKey, NewPriceRecord, PriceRecord, StagedObservation};
pub use store::PriceRecordStore;
