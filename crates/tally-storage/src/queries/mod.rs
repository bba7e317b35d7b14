// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the canonical relations and the run history.
//!
//! SQL column lists are generated from the [`Relation`] constants so the
//! declared schema and the statements cannot drift apart.
//!
//! [`Relation`]: tally_core::Relation

pub mod costs;
pub mod partitions;
pub mod productivity;
pub mod runs;
pub mod usage;

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{Type, Value};
use tally_core::RelationKind;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn insert_sql(relation: RelationKind) -> String {
    let columns = relation.columns();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        relation.table(),
        columns.join(", "),
        placeholders.join(", ")
    )
}

pub(crate) fn select_sql(relation: RelationKind) -> String {
    format!(
        "SELECT {} FROM {} WHERE activity_date = ?1 ORDER BY rowid",
        relation.columns().join(", "),
        relation.table()
    )
}

pub(crate) fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

pub(crate) fn text_value(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

/// Counters are stored as SQLite integers; anything above `i64::MAX` is
/// clamped.
pub(crate) fn count_value(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

pub(crate) fn get_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a TEXT column through `FromStr`.
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
