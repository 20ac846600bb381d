//! SQLite catalog introspection via `sqlite_master` and PRAGMA functions.

use crate::Result;
use crate::adapters::helpers::map_statement_error;
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor};
use sqlx::{Row, SqlitePool};

pub(super) async fn base_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to list SQLite tables", None, e))
}

/// Whether the table definition declares an AUTOINCREMENT key.
async fn declares_autoincrement(pool: &SqlitePool, table: &str) -> Result<bool> {
    let sql = sqlx::query_scalar::<_, Option<String>>(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read table definition", Some(table), e))?
    .flatten();

    Ok(sql.is_some_and(|definition| definition.to_uppercase().contains("AUTOINCREMENT")))
}

pub(super) async fn columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let rows = sqlx::query("SELECT name, type, pk FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| map_statement_error("Failed to read SQLite columns", Some(table), e))?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let autoincrement = declares_autoincrement(pool, table).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(|e| map_statement_error("Failed to decode column name", Some(table), e))?;
        let declared_type: String = row.try_get("type").unwrap_or_default();
        let pk: i64 = row.try_get("pk").unwrap_or(0);

        let mut column = ColumnDescriptor::new(name, declared_type.clone());
        column.max_length = parse_declared_length(&declared_type);
        // AUTOINCREMENT is only legal on an INTEGER PRIMARY KEY
        column.is_auto_generated =
            autoincrement && pk > 0 && declared_type.eq_ignore_ascii_case("INTEGER");
        columns.push(column);
    }

    Ok(columns)
}

pub(super) async fn primary_key_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read SQLite primary key", Some(table), e))
}

pub(super) async fn foreign_keys(
    pool: &SqlitePool,
    table: &str,
) -> Result<Vec<ForeignKeyDescriptor>> {
    let rows = sqlx::query(
        r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read SQLite foreign keys", Some(table), e))?;

    let mut foreign_keys = Vec::with_capacity(rows.len());
    for row in rows {
        let local_column: String = row.try_get("from").unwrap_or_default();
        let referenced_table: String = row.try_get("table").unwrap_or_default();
        let declared_target: Option<String> = row.try_get("to").unwrap_or(None);

        // `REFERENCES parent` without a column targets the parent's key
        let referenced_column = match declared_target {
            Some(column) => column,
            None => primary_key_columns(pool, &referenced_table)
                .await?
                .into_iter()
                .next()
                .unwrap_or_default(),
        };

        if local_column.is_empty() || referenced_column.is_empty() {
            tracing::warn!(
                "Skipping unresolved foreign key on {} referencing {}",
                table,
                referenced_table
            );
            continue;
        }

        foreign_keys.push(ForeignKeyDescriptor {
            local_column,
            referenced_table,
            referenced_column,
            lookup_values: Vec::new(),
        });
    }

    Ok(foreign_keys)
}

/// Length argument of a declared type such as `VARCHAR(50)`.
pub(super) fn parse_declared_length(declared_type: &str) -> Option<i64> {
    let open = declared_type.find('(')?;
    let close = declared_type[open..].find(')')?;
    let inner = declared_type.get(open.saturating_add(1)..open.saturating_add(close))?;
    inner.split(',').next()?.trim().parse().ok()
}
