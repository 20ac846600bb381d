//! Statement execution and row decoding for PostgreSQL.
//!
//! Row queries are wrapped in `row_to_json`, so every column type decodes
//! through a single JSON value with column order preserved.

use crate::Result;
use crate::adapters::helpers::{map_statement_error, statement_table};
use crate::literal::SqlValue;
use crate::models::{DatabaseType, Row};
use crate::statement::{Statement, quote_identifier};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{PgPool, Row as _};

/// Binds statement parameters in placeholder order.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
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

/// Wraps a row query so each row arrives as one JSON object.
pub(super) fn json_row_query(sql: &str) -> String {
    format!("SELECT row_to_json(t.*) AS row_data FROM ({}) t", sql)
}

pub(super) async fn fetch_rows(pool: &PgPool, statement: &Statement) -> Result<Vec<Row>> {
    tracing::debug!("PostgreSQL query: {}", statement);
    tracing::trace!("Parameters: [{}]", statement.rendered_params());
    let table = statement_table(&statement.sql);
    let sql = json_row_query(&statement.sql);

    let rows = bind_params(sqlx::query(&sql), &statement.params)
        .fetch_all(pool)
        .await
        .map_err(|e| map_statement_error("Query failed", table, e))?;

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let value: JsonValue = row
            .try_get("row_data")
            .map_err(|e| map_statement_error("Row decode failed", table, e))?;
        match value {
            JsonValue::Object(map) => result.push(map),
            other => tracing::warn!("Skipping non-object row from {:?}: {}", table, other),
        }
    }
    Ok(result)
}

pub(super) async fn fetch_count(pool: &PgPool, statement: &Statement) -> Result<u64> {
    tracing::debug!("PostgreSQL count: {}", statement);
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

pub(super) async fn execute(pool: &PgPool, statement: &Statement) -> Result<u64> {
    tracing::debug!("PostgreSQL execute: {}", statement);
    tracing::trace!("Parameters: [{}]", statement.rendered_params());
    let result = bind_params(sqlx::query(&statement.sql), &statement.params)
        .execute(pool)
        .await
        .map_err(|e| {
            map_statement_error("Statement failed", statement_table(&statement.sql), e)
        })?;
    Ok(result.rows_affected())
}

/// Ledger DDL qualified with `schema`, which is created when missing.
pub(super) fn audit_table_ddl(schema: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (
            audit_id SERIAL PRIMARY KEY,
            audit_user VARCHAR(100),
            audit_time TIMESTAMP DEFAULT NOW(),
            operation_performed VARCHAR(100),
            table_name VARCHAR(100),
            operation_status VARCHAR(15),
            operation_metadata VARCHAR(5000)
        )",
        quote_identifier(DatabaseType::PostgreSQL, schema),
        quote_identifier(DatabaseType::PostgreSQL, table)
    )
}

pub(super) async fn ensure_audit_table(pool: &PgPool, schema: &str, table: &str) -> Result<()> {
    let create_schema = format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_identifier(DatabaseType::PostgreSQL, schema)
    );
    sqlx::query(&create_schema)
        .execute(pool)
        .await
        .map_err(|e| map_statement_error("Failed to create audit schema", None, e))?;
    sqlx::query(&audit_table_ddl(schema, table))
        .execute(pool)
        .await
        .map_err(|e| map_statement_error("Failed to create audit table", Some(table), e))?;
    Ok(())
}
