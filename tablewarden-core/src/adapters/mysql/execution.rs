//! Statement execution and row decoding for MySQL.

use crate::Result;
use crate::adapters::helpers::{map_statement_error, statement_table};
use crate::literal::SqlValue;
use crate::models::{DatabaseType, Row};
use crate::statement::{Statement, quote_identifier};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySqlPool, Row as _};

/// Binds statement parameters in placeholder order.
fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

pub(super) async fn fetch_rows(pool: &MySqlPool, statement: &Statement) -> Result<Vec<Row>> {
    tracing::debug!("MySQL query: {}", statement);
    tracing::trace!("Parameters: [{}]", statement.rendered_params());
    let rows = bind_params(sqlx::query(&statement.sql), &statement.params)
        .fetch_all(pool)
        .await
        .map_err(|e| map_statement_error("Query failed", statement_table(&statement.sql), e))?;

    Ok(rows.iter().map(row_to_map).collect())
}

pub(super) async fn fetch_count(pool: &MySqlPool, statement: &Statement) -> Result<u64> {
    tracing::debug!("MySQL count: {}", statement);
    tracing::trace!("Parameters: [{}]", statement.rendered_params());
    let row = bind_params(sqlx::query(&statement.sql), &statement.params)
        .fetch_one(pool)
        .await
        .map_err(|e| map_statement_error("Count failed", statement_table(&statement.sql), e))?;

    let count: i64 = row
        .try_get(0)
        .map_err(|e| map_statement_error("Count decode failed", None, e))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

pub(super) async fn execute(pool: &MySqlPool, statement: &Statement) -> Result<u64> {
    tracing::debug!("MySQL execute: {}", statement);
    tracing::trace!("Parameters: [{}]", statement.rendered_params());
    let result = bind_params(sqlx::query(&statement.sql), &statement.params)
        .execute(pool)
        .await
        .map_err(|e| {
            map_statement_error("Statement failed", statement_table(&statement.sql), e)
        })?;
    Ok(result.rows_affected())
}

pub(super) fn audit_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            audit_id INT AUTO_INCREMENT PRIMARY KEY,
            audit_user VARCHAR(100),
            audit_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            operation_performed VARCHAR(100),
            table_name VARCHAR(100),
            operation_status VARCHAR(15),
            operation_metadata VARCHAR(5000)
        )",
        quote_identifier(DatabaseType::MySQL, table)
    )
}

pub(super) async fn ensure_audit_table(pool: &MySqlPool, table: &str) -> Result<()> {
    sqlx::query(&audit_table_ddl(table))
        .execute(pool)
        .await
        .map_err(|e| map_statement_error("Failed to create audit table", Some(table), e))?;
    Ok(())
}

fn row_to_map(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                extract_column_value(row, column.ordinal()),
            )
        })
        .collect()
}

/// Textual columns arrive as CHAR from the projection; the remaining
/// attempts cover numeric, temporal and binary results.
fn extract_column_value(row: &MySqlRow, index: usize) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(JsonValue::Null, JsonValue::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v
            .and_then(|f| serde_json::Number::from_f64(f64::from(f)))
            .map_or(JsonValue::Null, JsonValue::Number);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v.map_or(JsonValue::Null, |ts| {
            JsonValue::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())
        });
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v.map_or(JsonValue::Null, |d| JsonValue::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(JsonValue::Null, |bytes| {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            JsonValue::String(format!("base64:{}", encoded))
        });
    }
    JsonValue::Null
}
