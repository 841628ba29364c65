use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Error as RusqliteError, Row};

pub mod comments_db_operations;
pub mod posts_db_operations;
pub mod taxonomy_db_operations;
pub mod users_db_operations;

// Fixed width so that TEXT comparison in SQL is chronological.
const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(DB_TIMESTAMP_FORMAT).to_string()
}

pub fn from_db_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, DB_TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Reads a timestamp column written by `to_db_timestamp`.
pub(crate) fn timestamp_column(row: &Row, idx: usize) -> Result<DateTime<Utc>, RusqliteError> {
    let raw: String = row.get(idx)?;
    from_db_timestamp(&raw)
        .map_err(|e| RusqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
