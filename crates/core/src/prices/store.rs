//! Primary price store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{NewPriceRecord, PriceRecord};
use crate::errors::Result;

/// Durable price storage shared by every job and import worker.
#[async_trait]
pub trait PriceRecordStore: Send + Sync {
    /// Records for any of the given (product, market) pairs recorded at or
    /// after `since`.
    async fn find_recent_for_pairs(
        &self,
        pairs: &[(String, String)],
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>>;

    /// Bulk insert that silently skips rows whose id already exists.
    ///
    /// Returns the number of rows actually inserted.
    async fn insert_ignoring_duplicates(&self, records: &[NewPriceRecord]) -> Result<usize>;
}
