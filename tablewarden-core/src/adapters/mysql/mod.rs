//! MySQL database adapter with connection pooling.
//!
//! # Module Structure
//! - `connection`: Connection pool management and validation
//! - `introspection`: Columns and keys from `INFORMATION_SCHEMA`
//! - `execution`: Parameter binding, row decoding and ledger DDL
//!
//! # MySQL-Specific Features
//! - Tables are resolved in the connection's current database
//! - Auto-generated keys are `PRI` columns with `auto_increment` in `EXTRA`
//! - Column comments are the column descriptions

mod connection;
mod execution;
mod introspection;


use super::{ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnDescriptor, DatabaseType, ForeignKeyDescriptor, Row};
use crate::statement::Statement;
use async_trait::async_trait;
use sqlx::MySqlPool;

/// MySQL database adapter with connection pooling
pub struct MySqlAdapter {
    pub pool: MySqlPool,
    pub config: ConnectionConfig,
}

impl std::fmt::Debug for MySqlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    async fn test_connection(&self) -> Result<()> {
        let connectivity_result: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::TableWardenError::connection_failed)?;

        if connectivity_result != 1 {
            return Err(crate::error::TableWardenError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        let database: Option<String> = sqlx::query_scalar("SELECT CAST(DATABASE() AS CHAR)")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::TableWardenError::connection_failed)?;

        if database.is_none() {
            return Err(crate::error::TableWardenError::configuration(
                "No database selected: add the database name to the connection string",
            ));
        }

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn base_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        introspection::base_tables(&self.pool, schema).await
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
