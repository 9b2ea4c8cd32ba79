mod model;
mod repository;

pub use model::{NewPriceRecordDB, PriceRecordDB};
pub use repository::PriceRecordRepository;
