//! Database models for durable price records.

use chrono::Utc;
use diesel::prelude::*;

use pricewatch_core::errors::{Error, Result};
use pricewatch_core::prices::{NewPriceRecord, PriceRecord};

use crate::utils::{parse_db_decimal, parse_db_timestamp, to_db_timestamp};

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRecordDB {
    pub id: String,
    pub product_id: String,
    pub market_id: String,
    pub price: String,
    pub recorded_at: String,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::price_records)]
pub struct NewPriceRecordDB {
    pub id: String,
    pub product_id: String,
    pub market_id: String,
    pub price: String,
    pub recorded_at: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl TryFrom<PriceRecordDB> for PriceRecord {
    type Error = Error;

    fn try_from(db: PriceRecordDB) -> Result<Self> {
        Ok(PriceRecord {
            price: parse_db_decimal(&db.price)?,
            recorded_at: parse_db_timestamp(&db.recorded_at)?,
            created_at: parse_db_timestamp(&db.created_at)?,
            id: db.id,
            product_id: db.product_id,
            market_id: db.market_id,
            notes: db.notes,
        })
    }
}

impl From<&NewPriceRecord> for NewPriceRecordDB {
    fn from(record: &NewPriceRecord) -> Self {
        NewPriceRecordDB {
            id: record.id.clone(),
            product_id: record.product_id.clone(),
            market_id: record.market_id.clone(),
            price: record.price.round_dp(2).to_string(),
            recorded_at: to_db_timestamp(&record.recorded_at),
            notes: record.notes.clone(),
            created_at: to_db_timestamp(&Utc::now()),
        }
    }
}
