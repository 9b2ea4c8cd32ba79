//! Catalog storage traits.

use super::model::{Market, Product};
use crate::errors::Result;

/// Read access to the market catalog.
pub trait MarketRepositoryTrait: Send + Sync {
    /// Markets with a non-empty legal name, in stable catalog order.
    fn list_with_legal_name(&self) -> Result<Vec<Market>>;
}

/// Read access to the product catalog.
pub trait ProductRepositoryTrait: Send + Sync {
    /// Products with a non-empty barcode, in stable catalog order.
    fn list_with_barcode(&self) -> Result<Vec<Product>>;
}
