diesel::table! {
    staged_prices (id) {
        id -> BigInt,
        product_id -> Text,
        market_id -> Text,
        price -> Text,
        record_date -> Text,
        notes -> Nullable<Text>,
    }
}

pub(super) const CREATE_STAGING_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS staged_prices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id TEXT NOT NULL,
        market_id TEXT NOT NULL,
        price TEXT NOT NULL,
        record_date TEXT NOT NULL,
        notes TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_staged_prices_pair ON staged_prices (product_id, market_id);
    CREATE INDEX IF NOT EXISTS idx_staged_prices_record_date ON staged_prices (record_date);
";

pub(super) const STATS_QUERY: &str = "
    SELECT COUNT(*) AS count,
           COUNT(DISTINCT product_id) AS distinct_products,
           COUNT(DISTINCT market_id) AS distinct_markets,
           MIN(CAST(price AS REAL)) AS min_price,
           MAX(CAST(price AS REAL)) AS max_price,
           AVG(CAST(price AS REAL)) AS avg_price
    FROM staged_prices
";
