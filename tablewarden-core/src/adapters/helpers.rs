//! Helper utilities shared by the backend adapters.
//!
//! Error classification keeps the mapping from driver errors to
//! [`TableWardenError`] consistent across PostgreSQL, MySQL and SQLite.

use crate::error::TableWardenError;
use crate::models::Row;
use serde_json::Value as JsonValue;

/// SQLSTATE codes reported for a missing relation (PostgreSQL, MySQL).
const MISSING_RELATION_CODES: [&str; 2] = ["42P01", "42S02"];

/// Whether a driver error reports a table that does not exist.
#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub fn is_missing_relation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_err) => {
            db_err
                .code()
                .is_some_and(|code| MISSING_RELATION_CODES.iter().any(|c| *c == code))
                || db_err.message().contains("no such table")
        }
        _ => false,
    }
}

/// Maps a statement failure to the error taxonomy.
///
/// Missing relations become `NotFound` for `table`; every other failure is
/// an `Execution` error carrying `context`.
#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub fn map_statement_error(
    context: &str,
    table: Option<&str>,
    error: sqlx::Error,
) -> TableWardenError {
    if is_missing_relation(&error) {
        return TableWardenError::table_not_found(table.unwrap_or("<unknown>"));
    }
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            TableWardenError::connection_failed(error)
        }
        other => TableWardenError::execution_failed(context, other),
    }
}

/// Drops tables whose name contains any non-blank blacklist entry, then sorts.
///
/// Entries are matched as given; surrounding whitespace only decides
/// whether an entry counts as blank.
pub fn apply_blacklist(mut tables: Vec<String>, blacklist: &[String]) -> Vec<String> {
    tables.retain(|table| {
        !blacklist
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .any(|entry| table.contains(entry.as_str()))
    });
    tables.sort();
    tables.dedup();
    tables
}

/// Rough table name for error context, taken from the statement text.
pub fn statement_table(sql: &str) -> Option<&str> {
    let mut words = sql.split_whitespace();
    while let Some(word) = words.next() {
        if matches!(word.to_uppercase().as_str(), "FROM" | "INTO" | "UPDATE") {
            return words
                .next()
                .map(|t| t.trim_matches(|c| c == '"' || c == '`' || c == '(' || c == ')'));
        }
    }
    None
}

/// Extracts the first value of a single-column row.
pub fn first_value(row: Row) -> JsonValue {
    row.into_iter()
        .next()
        .map_or(JsonValue::Null, |(_, value)| value)
}
