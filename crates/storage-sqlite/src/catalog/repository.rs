//! Read repositories over the market and product catalogs.

use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use pricewatch_core::catalog::{Market, MarketRepositoryTrait, Product, ProductRepositoryTrait};
use pricewatch_core::errors::Result;

use super::model::{MarketDB, ProductDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::{markets, products};
use crate::utils::to_db_timestamp;

pub struct MarketRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl MarketRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Adds or replaces a market.
    pub async fn upsert(&self, market: Market) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = MarketDB {
                    id: market.id,
                    name: market.name,
                    legal_name: market.legal_name,
                    location: market.location,
                    created_at: to_db_timestamp(&Utc::now()),
                };
                diesel::replace_into(markets::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }
}

impl MarketRepositoryTrait for MarketRepository {
    fn list_with_legal_name(&self) -> Result<Vec<Market>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = markets::table
            .filter(markets::legal_name.is_not_null())
            .filter(markets::legal_name.ne(""))
            .order((markets::created_at.asc(), markets::id.asc()))
            .select(MarketDB::as_select())
            .load::<MarketDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Market::from).collect())
    }
}

pub struct ProductRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProductRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Adds or replaces a product.
    pub async fn upsert(&self, product: Product) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let row = ProductDB {
                    id: product.id,
                    name: product.name,
                    barcode: product.barcode,
                    created_at: to_db_timestamp(&Utc::now()),
                };
                diesel::replace_into(products::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }
}

impl ProductRepositoryTrait for ProductRepository {
    fn list_with_barcode(&self) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = products::table
            .filter(products::barcode.is_not_null())
            .filter(products::barcode.ne(""))
            .order((products::created_at.asc(), products::id.asc()))
            .select(ProductDB::as_select())
            .load::<ProductDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}
