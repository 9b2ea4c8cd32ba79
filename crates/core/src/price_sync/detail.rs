//! Typed phase detail stored on the job record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-market aggregate of staged observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub market_id: String,
    pub market_name: String,
    pub observations: u64,
    pub min_price: Decimal,
}

/// Final aggregates of a run. Field names are the ones status pollers
/// already consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSyncSummary {
    #[serde(rename = "mercadosProcessados")]
    pub markets_processed: u64,
    #[serde(rename = "produtosProcessados")]
    pub products_processed: u64,
    #[serde(rename = "produtosEncontrados")]
    pub products_found: u64,
    #[serde(rename = "produtosNaoEncontrados")]
    pub products_not_found: u64,
    #[serde(rename = "precosRegistrados")]
    pub prices_staged: u64,
    #[serde(rename = "precosImportados")]
    pub prices_imported: u64,
    #[serde(rename = "precosIgnorados")]
    pub prices_skipped: u64,
    #[serde(rename = "errosImportacao")]
    pub import_errors: u64,
    #[serde(rename = "backupStatus")]
    pub backup_status: String,
    #[serde(rename = "backupSnapshotId", default, skip_serializing_if = "Option::is_none")]
    pub backup_snapshot_id: Option<String>,
    #[serde(rename = "collectDurationMs")]
    pub collect_duration_ms: u64,
    #[serde(rename = "importDurationMs")]
    pub import_duration_ms: u64,
    #[serde(rename = "totalDurationMs")]
    pub total_duration_ms: u64,
    /// In order of each market's first appearance in product order.
    #[serde(rename = "mercados", default)]
    pub markets: Vec<MarketSummary>,
}

/// Phase-specific detail. Unknown phases fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PhaseDetail {
    Queued,
    Init,
    Collecting {
        batch: u64,
        total_batches: u64,
        processed: u64,
        total_products: u64,
        found: u64,
        not_found: u64,
        staged: u64,
        eta_seconds: Option<u64>,
    },
    Importing {
        imported: u64,
        skipped: u64,
        errors: u64,
        total: u64,
    },
    BackingUp,
    Completed(PriceSyncSummary),
    Failed {
        message: String,
    },
    Cancelled(PriceSyncSummary),
}

impl PhaseDetail {
    pub fn summary(&self) -> Option<&PriceSyncSummary> {
        match self {
            PhaseDetail::Completed(summary) | PhaseDetail::Cancelled(summary) => Some(summary),
            _ => None,
        }
    }
}
