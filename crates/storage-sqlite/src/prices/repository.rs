//! Primary store for price records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use pricewatch_core::errors::Result;
use pricewatch_core::prices::{NewPriceRecord, PriceRecord, PriceRecordStore};

use super::model::{NewPriceRecordDB, PriceRecordDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::price_records;
use crate::utils::{chunk_pairs_for_sqlite, to_db_timestamp, SQLITE_MAX_PARAMS_CHUNK};

// Seven bound columns per row.
const ROWS_PER_INSERT: usize = SQLITE_MAX_PARAMS_CHUNK / 7;

pub struct PriceRecordRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PriceRecordRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    pub fn count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        price_records::table
            .count()
            .get_result(&mut conn)
            .into_core()
    }

    /// Records for one product, newest first.
    pub fn list_for_product(&self, product_id: &str) -> Result<Vec<PriceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = price_records::table
            .filter(price_records::product_id.eq(product_id))
            .order(price_records::recorded_at.desc())
            .select(PriceRecordDB::as_select())
            .load::<PriceRecordDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(PriceRecord::try_from).collect()
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[async_trait]
impl PriceRecordStore for PriceRecordRepository {
    async fn find_recent_for_pairs(
        &self,
        pairs: &[(String, String)],
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: HashSet<(&str, &str)> = pairs
            .iter()
            .map(|(p, m)| (p.as_str(), m.as_str()))
            .collect();
        let since = to_db_timestamp(&since);
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::new();

        // Both sides go into IN lists; rows for cross pairs are dropped below.
        for chunk in chunk_pairs_for_sqlite(pairs) {
            let product_ids: Vec<&str> = distinct(chunk.iter().map(|(p, _)| p.as_str()));
            let market_ids: Vec<&str> = distinct(chunk.iter().map(|(_, m)| m.as_str()));

            let rows = price_records::table
                .filter(price_records::product_id.eq_any(product_ids))
                .filter(price_records::market_id.eq_any(market_ids))
                .filter(price_records::recorded_at.ge(&since))
                .select(PriceRecordDB::as_select())
                .load::<PriceRecordDB>(&mut conn)
                .into_core()?;

            for row in rows {
                if wanted.contains(&(row.product_id.as_str(), row.market_id.as_str())) {
                    found.push(PriceRecord::try_from(row)?);
                }
            }
        }

        Ok(found)
    }

    async fn insert_ignoring_duplicates(&self, records: &[NewPriceRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<NewPriceRecordDB> = records.iter().map(NewPriceRecordDB::from).collect();

        self.writer
            .exec(move |conn| {
                let mut inserted = 0;
                for chunk in rows.chunks(ROWS_PER_INSERT) {
                    inserted += diesel::insert_or_ignore_into(price_records::table)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(inserted)
            })
            .await
    }
}
