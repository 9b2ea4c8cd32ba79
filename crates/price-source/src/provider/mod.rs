//! Price provider abstraction and the concrete HTTP implementation.

pub mod menor_preco;

use async_trait::async_trait;

use crate::errors::PriceSourceError;
use crate::models::Observation;

pub use menor_preco::MenorPrecoProvider;

/// A source of price observations keyed by product barcode.
///
/// Implementations issue exactly one request per call; there is no retry
/// or pagination at this layer.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Identifier used in logs and error messages.
    fn id(&self) -> &'static str;

    /// Fetch every observation the source knows for `barcode` within the
    /// configured locale, radius and period.
    async fn search_by_barcode(&self, barcode: &str) -> Result<Vec<Observation>, PriceSourceError>;
}
