//! Catalog domain models.

use serde::{Deserialize, Serialize};

/// A market (store) known to the system. Only used as matching input here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub name: String,
    /// Registered legal name; markets without one never take part in a sync.
    pub legal_name: Option<String>,
    /// Free-form address ("Rua XV de Novembro, 1200 - Centro").
    pub location: Option<String>,
}

impl Market {
    /// True when the market carries a non-blank stored address.
    pub fn has_address(&self) -> bool {
        self.location
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }
}

/// A product whose prices are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
}
