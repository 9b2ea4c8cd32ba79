//! Read-only catalogs driving a sync run: markets to match against and
//! products to query.

mod model;
mod store;

pub use model::{Market, Product};
pub use store::{MarketRepositoryTrait, ProductRepositoryTrait};
