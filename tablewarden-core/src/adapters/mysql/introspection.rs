//! MySQL catalog introspection via `INFORMATION_SCHEMA`.
//!
//! Catalog columns are cast to CHAR / SIGNED so they decode the same way
//! regardless of server version and collation.

use crate::Result;
use crate::adapters::helpers::map_statement_error;
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor};
use sqlx::{MySqlPool, Row};

pub(super) async fn base_tables(pool: &MySqlPool, schema: Option<&str>) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR)
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to list MySQL tables", None, e))
}

pub(super) async fn columns(pool: &MySqlPool, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let rows = sqlx::query(
        r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS column_name,
            CAST(COLUMN_TYPE AS CHAR) AS column_type,
            CAST(DATA_TYPE AS CHAR) AS data_type,
            CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS max_length,
            CAST(COLUMN_KEY AS CHAR) AS column_key,
            CAST(EXTRA AS CHAR) AS extra,
            CAST(COLUMN_COMMENT AS CHAR) AS column_comment
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read MySQL columns", Some(table), e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("column_name")
            .map_err(|e| map_statement_error("Failed to decode column name", Some(table), e))?;
        let column_type: String = row.try_get("column_type").unwrap_or_default();
        let column_key: String = row.try_get("column_key").unwrap_or_default();
        let extra: String = row.try_get("extra").unwrap_or_default();
        let comment: Option<String> = row.try_get("column_comment").unwrap_or(None);

        let mut column = ColumnDescriptor::new(name, column_type);
        column.native_type = row.try_get("data_type").unwrap_or_default();
        column.max_length = row.try_get("max_length").unwrap_or(None);
        column.description = comment.filter(|c| !c.is_empty());
        column.is_auto_generated = is_auto_generated(&column_key, &extra);
        columns.push(column);
    }

    Ok(columns)
}

/// `PRI` key with `auto_increment` in `EXTRA`.
pub(super) fn is_auto_generated(column_key: &str, extra: &str) -> bool {
    column_key.eq_ignore_ascii_case("PRI") && extra.to_lowercase().contains("auto_increment")
}

pub(super) async fn primary_key_columns(pool: &MySqlPool, table: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT CAST(COLUMN_NAME AS CHAR)
        FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read MySQL primary key", Some(table), e))
}

pub(super) async fn foreign_keys(
    pool: &MySqlPool,
    table: &str,
) -> Result<Vec<ForeignKeyDescriptor>> {
    let rows = sqlx::query(
        r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS local_column,
            CAST(REFERENCED_TABLE_NAME AS CHAR) AS referenced_table,
            CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column
        FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_NAME = ?
            AND REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read MySQL foreign keys", Some(table), e))?;

    let mut foreign_keys = Vec::with_capacity(rows.len());
    for row in rows {
        foreign_keys.push(ForeignKeyDescriptor {
            local_column: row.try_get("local_column").unwrap_or_default(),
            referenced_table: row.try_get("referenced_table").unwrap_or_default(),
            referenced_column: row.try_get("referenced_column").unwrap_or_default(),
            lookup_values: Vec::new(),
        });
    }

    Ok(foreign_keys)
}
