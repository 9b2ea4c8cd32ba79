//! Price domain models.

use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A matched observation waiting in the write buffer. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedObservation {
    pub product_id: String,
    pub market_id: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A durable price record in the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub id: String,
    pub product_id: String,
    pub market_id: String,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey::new(&self.product_id, &self.market_id, self.price)
    }
}

/// Input for a primary-store insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceRecord {
    /// Derived from the duplicate key plus the observation day, so the
    /// store's duplicate-skipping insert backstops concurrent imports.
    pub id: String,
    pub product_id: String,
    pub market_id: String,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewPriceRecord {
    pub fn from_staged(obs: &StagedObservation) -> Self {
        let key = DuplicateKey::of_staged(obs);
        Self {
            id: format!(
                "{}:{}:{}:{}",
                key.product_id,
                key.market_id,
                key.price_cents,
                obs.observed_at.format("%Y%m%d")
            ),
            product_id: obs.product_id.clone(),
            market_id: obs.market_id.clone(),
            price: obs.price,
            recorded_at: obs.observed_at,
            notes: obs.notes.clone(),
        }
    }
}

/// Identity used for operational de-duplication: product, market and price
/// in cents (2-decimal precision).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub product_id: String,
    pub market_id: String,
    pub price_cents: i64,
}

impl DuplicateKey {
    pub fn new(product_id: &str, market_id: &str, price: Decimal) -> Self {
        let price_cents = (price.round_dp(2) * Decimal::ONE_HUNDRED)
            .to_i64()
            .unwrap_or(i64::MAX);
        Self {
            product_id: product_id.to_string(),
            market_id: market_id.to_string(),
            price_cents,
        }
    }

    pub fn of_staged(observation: &StagedObservation) -> Self {
        Self::new(
            &observation.product_id,
            &observation.market_id,
            observation.price,
        )
    }
}
