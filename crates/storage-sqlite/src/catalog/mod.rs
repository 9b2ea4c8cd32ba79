mod model;
mod repository;

pub use model::{MarketDB, ProductDB};
pub use repository::{MarketRepository, ProductRepository};
