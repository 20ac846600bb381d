//! SQLite database adapter.
//!
//! # Module Structure
//! - `connection`: Connection handling and in-memory database pinning
//! - `introspection`: Tables, columns and keys via `sqlite_master` and PRAGMA functions
//! - `execution`: Parameter binding, row decoding and ledger DDL
//!
//! # SQLite-Specific Features
//! - Uses the `pragma_table_info` / `pragma_foreign_key_list` table-valued
//!   functions so table names are bound, not interpolated
//! - Auto-generated keys are detected from the `AUTOINCREMENT` keyword
//! - Supports both file-based and in-memory databases

pub mod connection;
mod execution;
mod introspection;


use super::{ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnDescriptor, DatabaseType, ForeignKeyDescriptor, Row};
use crate::statement::Statement;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// SQLite database adapter.
///
/// In-memory databases live exactly as long as their single pooled
/// connection, so the pool for them never expires connections.
pub struct SqliteAdapter {
    /// Connection pool (single connection for in-memory databases)
    pub pool: SqlitePool,
    /// Connection configuration
    pub config: ConnectionConfig,
    /// Original connection string (kept for reference, public for test access)
    pub connection_string: String,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("config", &self.config)
            .field("is_in_memory", &self.is_in_memory())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
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

        // Catalog access is required for every introspection call
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::TableWardenError::connection_failed)?;

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn base_tables(&self, _schema: Option<&str>) -> Result<Vec<String>> {
        introspection::base_tables(&self.pool).await
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        introspection::columns(&self.pool, table).await
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        introspection::primary_key_columns(&self.pool, table).await
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescriptor>> {
        introspection::foreign_keys(&self.pool, table).await
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
        execution::ensure_audit_table(&self.pool, table).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
