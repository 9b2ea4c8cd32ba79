//! Database models for the market and product catalogs.

use diesel::prelude::*;

use pricewatch_core::catalog::{Market, Product};

#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketDB {
    pub id: String,
    pub name: String,
    pub legal_name: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductDB {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub created_at: String,
}

impl From<MarketDB> for Market {
    fn from(db: MarketDB) -> Self {
        Market {
            id: db.id,
            name: db.name,
            legal_name: db.legal_name,
            location: db.location,
        }
    }
}

impl From<ProductDB> for Product {
    fn from(db: ProductDB) -> Self {
        Product {
            id: db.id,
            name: db.name,
            barcode: db.barcode,
        }
    }
}
