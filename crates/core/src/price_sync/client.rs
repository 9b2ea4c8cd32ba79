//! Price source facade over the price-source crate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;

use super::errors::PriceSourceError;
use crate::matching::SellerReference;

use pricewatch_price_source::{Observation as ExternalObservation, PriceProvider};

/// One observation in core terms.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObservation {
    pub seller: SellerReference,
    pub description: Option<String>,
    pub listed_price: Decimal,
    pub discount: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl SourceObservation {
    /// Listed price minus discount, or `None` when the discount swallows
    /// the whole price.
    pub fn net_price(&self) -> Option<Decimal> {
        let net = self.listed_price - self.discount;
        (net > Decimal::ZERO).then_some(net)
    }
}

impl From<ExternalObservation> for SourceObservation {
    fn from(obs: ExternalObservation) -> Self {
        let establishment = obs.establishment;
        Self {
            seller: SellerReference {
                name: establishment.legal_name,
                street: establishment.street,
                number: establishment.number,
                neighborhood: establishment.neighborhood,
            },
            description: obs.description,
            listed_price: obs.listed_price,
            discount: obs.discount,
            observed_at: obs.observed_at,
        }
    }
}

/// Where observations come from.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn observations_for(&self, barcode: &str) -> Result<Vec<SourceObservation>, PriceSourceError>;
}

/// Adapts a price-source provider to [`PriceSource`].
pub struct PriceSourceClient {
    provider: Arc<dyn PriceProvider>,
}

impl PriceSourceClient {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PriceSource for PriceSourceClient {
    async fn observations_for(&self, barcode: &str) -> Result<Vec<SourceObservation>, PriceSourceError> {
        let observations = self.provider.search_by_barcode(barcode).await?;
        debug!(
            "{}: {} observations for barcode {}",
            self.provider.id(),
            observations.len(),
            barcode
        );
        Ok(observations.into_iter().map(SourceObservation::from).collect())
    }
}
