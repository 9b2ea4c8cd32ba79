//! Helpers shared by the SQLite repositories: parameter chunking and the
//! text encodings used for timestamps and decimals.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use pricewatch_core::errors::{DatabaseError, Error, Result};

/// Maximum number of bound parameters per statement.
///
/// SQLite's compile-time limit is typically 999 (SQLITE_MAX_VARIABLE_NUMBER);
/// 500 leaves room for the other parameters of a query.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits a slice into chunks that fit one `IN (...)` clause.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

/// Splits (a, b) pairs so that two `IN (...)` clauses, one per side, stay
/// under the parameter limit together.
pub fn chunk_pairs_for_sqlite<T>(pairs: &[T]) -> impl Iterator<Item = &[T]> {
    pairs.chunks(SQLITE_MAX_PARAMS_CHUNK / 2)
}

/// Timestamps are stored as fixed-width RFC3339 text so that string
/// comparison in SQL matches chronological order.
pub fn to_db_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("timestamp '{}': {}", value, e)))
}

pub fn parse_db_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| corrupt(format!("decimal '{}': {}", value, e)))
}

fn corrupt(message: String) -> Error {
    Error::Database(DatabaseError::Internal(format!("Corrupt column value, {}", message)))
}
