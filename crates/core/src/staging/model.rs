use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Advisory aggregate over a staging store, for progress display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingStats {
    pub count: u64,
    pub distinct_products: u64,
    pub distinct_markets: u64,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub avg_price: Option<Decimal>,
}

/// Deterministic file name of a job's staging store.
pub fn staging_file_name(job_id: &str) -> String {
    format!("staging_{}.db", job_id)
}
