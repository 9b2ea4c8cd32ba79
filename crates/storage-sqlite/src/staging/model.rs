use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use pricewatch_core::errors::{Error, Result};
use pricewatch_core::prices::StagedObservation;
use pricewatch_core::staging::StagingStats;

use crate::utils::{parse_db_decimal, parse_db_timestamp, to_db_timestamp};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = super::schema::staged_prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(super) struct StagedPriceDB {
    pub product_id: String,
    pub market_id: String,
    pub price: String,
    pub record_date: String,
    pub notes: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = super::schema::staged_prices)]
pub(super) struct NewStagedPriceDB {
    pub product_id: String,
    pub market_id: String,
    pub price: String,
    pub record_date: String,
    pub notes: Option<String>,
}

impl From<&StagedObservation> for NewStagedPriceDB {
    fn from(obs: &StagedObservation) -> Self {
        NewStagedPriceDB {
            product_id: obs.product_id.clone(),
            market_id: obs.market_id.clone(),
            price: obs.price.to_string(),
            record_date: to_db_timestamp(&obs.observed_at),
            notes: obs.notes.clone(),
        }
    }
}

impl TryFrom<StagedPriceDB> for StagedObservation {
    type Error = Error;

    fn try_from(db: StagedPriceDB) -> Result<Self> {
        Ok(StagedObservation {
            price: parse_db_decimal(&db.price)?,
            observed_at: parse_db_timestamp(&db.record_date)?,
            product_id: db.product_id,
            market_id: db.market_id,
            notes: db.notes,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub(super) struct StatsRow {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
    #[diesel(sql_type = BigInt)]
    pub distinct_products: i64,
    #[diesel(sql_type = BigInt)]
    pub distinct_markets: i64,
    #[diesel(sql_type = Nullable<Double>)]
    pub min_price: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub max_price: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_price: Option<f64>,
}

fn to_money(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64).map(|d| d.round_dp(2))
}

impl From<StatsRow> for StagingStats {
    fn from(row: StatsRow) -> Self {
        StagingStats {
            count: row.count.max(0) as u64,
            distinct_products: row.distinct_products.max(0) as u64,
            distinct_markets: row.distinct_markets.max(0) as u64,
            min_price: to_money(row.min_price),
            max_price: to_money(row.max_price),
            avg_price: to_money(row.avg_price),
        }
    }
}
