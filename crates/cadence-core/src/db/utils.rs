//! Column encoding helpers shared by the query modules.

use std::str::FromStr;

use jiff::Timestamp;
use rusqlite::{types::Type, Row};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Formats a timestamp with fixed nanosecond precision so stored values
/// sort lexicographically in time order.
pub(super) fn timestamp_str(timestamp: &Timestamp) -> String {
    format!("{timestamp:.9}")
}

pub(super) fn optional_timestamp_str(timestamp: Option<&Timestamp>) -> Option<String> {
    timestamp.map(timestamp_str)
}

pub(super) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(super) fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Timestamp> {
    row.get::<_, String>(idx)?
        .parse::<Timestamp>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn optional_timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| {
            raw.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
}

/// Parses a status-like column through its `FromStr` implementation.
pub(super) fn parse_at<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(super) fn json_at<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn optional_json_at<T: DeserializeOwned>(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
}

/// Converts a page size or offset into an SQLite integer.
pub(super) fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
