//! PostgreSQL catalog introspection.
//!
//! Columns and primary keys come from `information_schema`; comments and
//! foreign keys come from `pg_catalog`, which also covers foreign keys the
//! current role does not own.

use crate::Result;
use crate::adapters::helpers::map_statement_error;
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor};
use sqlx::{PgPool, Row};

pub(super) async fn base_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = $1 AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to list PostgreSQL tables", None, e))
}

pub(super) async fn columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnDescriptor>> {
    let rows = sqlx::query(
        r#"
        SELECT
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.udt_name::text AS udt_name,
            c.character_maximum_length::bigint AS max_length,
            (COALESCE(c.column_default, '') LIKE 'nextval(%'
                OR c.is_identity = 'YES') AS is_generated,
            col_description(
                format('%I.%I', c.table_schema, c.table_name)::regclass,
                c.ordinal_position::int
            ) AS description
        FROM information_schema.columns c
        WHERE c.table_schema = $1 AND c.table_name = $2
        ORDER BY c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read PostgreSQL columns", Some(table), e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("column_name")
            .map_err(|e| map_statement_error("Failed to decode column name", Some(table), e))?;
        let declared_type: String = row.try_get("data_type").unwrap_or_default();

        let mut column = ColumnDescriptor::new(name, declared_type);
        column.native_type = row.try_get("udt_name").unwrap_or_default();
        column.max_length = row.try_get("max_length").unwrap_or(None);
        column.description = row.try_get("description").unwrap_or(None);
        column.is_auto_generated = row.try_get("is_generated").unwrap_or(false);
        columns.push(column);
    }

    Ok(columns)
}

pub(super) async fn primary_key_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT kcu.column_name::text
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
            AND tc.table_name = kcu.table_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = $1
            AND tc.table_name = $2
        ORDER BY kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read PostgreSQL primary key", Some(table), e))
}

pub(super) async fn foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeyDescriptor>> {
    let rows = sqlx::query(
        r#"
        SELECT
            la.attname::text AS local_column,
            rc.relname::text AS referenced_table,
            ra.attname::text AS referenced_column
        FROM pg_constraint con
        JOIN pg_class c ON c.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        JOIN pg_class rc ON rc.oid = con.confrelid
        CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(local_attnum, ref_attnum)
        JOIN pg_attribute la ON la.attrelid = con.conrelid AND la.attnum = k.local_attnum
        JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.ref_attnum
        WHERE con.contype = 'f' AND n.nspname = $1 AND c.relname = $2
        ORDER BY con.conname, la.attnum
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| map_statement_error("Failed to read PostgreSQL foreign keys", Some(table), e))?;

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
