//! Typed observations returned by the price-discovery API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The seller ("establishment") an observation was recorded at.
///
/// Only `legal_name` is guaranteed non-empty; the address fragments are
/// whatever the API returned, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Establishment {
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
}

/// One validated price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Product description as printed on the receipt.
    pub description: Option<String>,
    pub establishment: Establishment,
    /// Listed (shelf) price.
    pub listed_price: Decimal,
    /// Discount applied at the till, zero when absent.
    pub discount: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Parameters of a single barcode query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub barcode: String,
    pub locale: String,
    pub radius_km: u32,
    pub period_days: u32,
}

impl SearchParams {
    /// Query string pairs in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("local", self.locale.clone()),
            ("termo", self.barcode.clone()),
            ("raio", self.radius_km.to_string()),
            ("data", format!("-{}", self.period_days)),
            ("offset", "0".to_string()),
        ]
    }
}
