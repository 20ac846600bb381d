//! PostgreSQL database adapter with connection pooling.
//!
//! # Module Structure
//! - `connection`: Connection pool management and validation
//! - `introspection`: Columns, keys and comments from `information_schema` and `pg_catalog`
//! - `execution`: Parameter binding, `row_to_json` row decoding and ledger DDL
//!
//! # Security Guarantees
//! - Connection strings are sanitized in error messages
//! - Statement timeouts prevent resource exhaustion
//! - Connection pooling with configurable limits

mod connection;
mod execution;
mod introspection;


use super::{ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnDescriptor, DatabaseType, ForeignKeyDescriptor, Row};
use crate::statement::Statement;
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL database adapter with connection pooling
pub struct PostgresAdapter {
    pub pool: PgPool,
    pub config: ConnectionConfig,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresAdapter {
    fn schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(&self.config.schema)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    async fn test_connection(&self) -> Result<()> {
        let connectivity_result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::TableWardenError::connection_failed)?;

        if connectivity_result != 1 {
            return Err(crate::error::TableWardenError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        // Verify we can access information_schema (required for introspection)
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = $1",
        )
        .bind(&self.config.schema)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::error::TableWardenError::connection_failed)?;

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn base_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        introspection::base_tables(&self.pool, self.schema(schema)).await
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        introspection::columns(&self.pool, &self.config.schema, table).await
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        introspection::primary_key_columns(&self.pool, &self.config.schema, table).await
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescriptor>> {
        introspection::foreign_keys(&self.pool, &self.config.schema, table).await
    }

    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Row>> {
        execution::fetch_rows(&self.pool, statement).await
    }

    async fn fetch_count(&self, statement: &Statement) -> Result<u64> {
        execution::fetch_count(&self.pool, statement).await
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        execution::execute(&self.pool, statement).await
    }

    async fn ensure_audit_table(&self, table: &str) -> Result<()> {
        execution::ensure_audit_table(&self.pool, &self.config.schema, table).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
