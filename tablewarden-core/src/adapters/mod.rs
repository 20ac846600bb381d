//! Database adapter trait and factory for unified table access.
//!
//! One [`DatabaseAdapter`] implementation exists per relational engine.
//! Each implementation supplies the catalog primitives (columns, primary
//! keys, foreign keys, base tables) and statement execution; the trait's
//! provided methods compose them into the introspection results the
//! service and ledger consume.
//!
//! # Module Structure
//! - `config`: Configuration types (ConnectionConfig, EngineConfig)
//! - `helpers`: Shared error classification and blacklist filtering
//! - Database-specific modules (postgres, mysql, sqlite)

use crate::{
    Result,
    error::TableWardenError,
    models::{ColumnDescriptor, DatabaseType, ForeignKeyDescriptor, Row, TableColumns},
    statement::{Statement, distinct_values},
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

// Configuration module
pub mod config;

// Re-export configuration types for convenience
pub use config::{ConnectionConfig, EngineConfig};

/// Main trait for database adapters with object-safe design.
///
/// # Security Guarantees
/// - Statements are executed with bound parameters only
/// - Credentials are never stored or logged
/// - Connection strings are sanitized in error messages
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn DatabaseAdapter>` or `Arc<dyn DatabaseAdapter>`.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Tests the database connection and catalog access.
    ///
    /// # Errors
    /// Returns error if connection fails or times out
    async fn test_connection(&self) -> Result<()>;

    /// Returns the database type this adapter handles.
    fn database_type(&self) -> DatabaseType;

    /// Gets the connection configuration (credentials sanitized).
    fn connection_config(&self) -> ConnectionConfig;

    /// Base tables (no views) of a schema; `None` uses the configured schema.
    async fn base_tables(&self, schema: Option<&str>) -> Result<Vec<String>>;

    /// Columns of a table in ordinal order.
    ///
    /// Key and insertable flags are left for [`DatabaseAdapter::table_columns`]
    /// to derive. An unknown table yields an empty list.
    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Primary key column names in key order.
    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Foreign keys declared on the table, without lookup values.
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescriptor>>;

    /// Runs a query and shapes each row into an ordered column map.
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Runs a `COUNT(*)` query.
    async fn fetch_count(&self, statement: &Statement) -> Result<u64>;

    /// Runs a mutation and returns the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Creates the audit ledger table when it does not exist.
    async fn ensure_audit_table(&self, table: &str) -> Result<()>;

    /// Closes the connection pool gracefully.
    async fn close(&self);

    /// Lists base tables minus blacklisted names, sorted.
    ///
    /// A table is hidden when its name contains any non-blank entry.
    async fn list_tables(&self, blacklist: &[String], schema: Option<&str>) -> Result<Vec<String>> {
        let tables = self.base_tables(schema).await?;
        Ok(helpers::apply_blacklist(tables, blacklist))
    }

    /// Introspects a table and derives key and insertable flags.
    ///
    /// Runs on every call; nothing is cached.
    ///
    /// # Errors
    /// `NotFound` when the table has no columns (it does not exist).
    async fn table_columns(&self, table: &str, load_fk_data: bool) -> Result<TableColumns> {
        let mut view = self.introspect_columns(table).await?;
        if view.is_empty() {
            return Err(TableWardenError::table_not_found(table));
        }

        let pk_columns = self.primary_key_columns(table).await?;
        for column in &mut view {
            column.is_primary_key = pk_columns.contains(&column.name);
            column.derive_insertable();
        }

        let mut fk_columns = self.foreign_keys(table).await?;
        if load_fk_data {
            for fk in &mut fk_columns {
                fk.lookup_values = self.foreign_key_lookup_values(fk).await?;
            }
        }

        tracing::debug!(
            "Introspected {}: {} columns, {} key columns, {} foreign keys",
            table,
            view.len(),
            pk_columns.len(),
            fk_columns.len()
        );

        Ok(TableColumns {
            table: table.to_string(),
            view,
            pk_columns,
            fk_columns,
        })
    }

    /// Distinct values of the column a foreign key references.
    async fn foreign_key_lookup_values(&self, fk: &ForeignKeyDescriptor) -> Result<Vec<JsonValue>> {
        let statement = distinct_values(
            self.database_type(),
            &fk.referenced_table,
            &fk.referenced_column,
        );
        let rows = self.fetch_rows(&statement).await?;
        Ok(rows.into_iter().map(helpers::first_value).collect())
    }
}

/// Factory function to create database adapters based on connection string.
///
/// # Arguments
/// * `connection_string` - Database connection URL (will be sanitized in errors)
/// * `config` - Pool and session settings
///
/// # Errors
/// Returns error if:
/// - Connection string format is invalid
/// - Database type is not supported
/// - Required features are not compiled in
pub async fn create_adapter(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<Box<dyn DatabaseAdapter>> {
    config.validate()?;
    let database_type = detect_database_type(connection_string)?;
    tracing::info!(
        "Connecting to {} at {}",
        database_type,
        redact_database_url(connection_string)
    );

    match database_type {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => {
            let adapter =
                postgres::PostgresAdapter::with_config(connection_string, config.clone()).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseType::PostgreSQL => Err(TableWardenError::configuration(
            "PostgreSQL support not compiled in. Use --features postgresql",
        )),
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => {
            let adapter = mysql::MySqlAdapter::with_config(connection_string, config.clone()).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseType::MySQL => Err(TableWardenError::configuration(
            "MySQL support not compiled in. Use --features mysql",
        )),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => {
            let adapter =
                sqlite::SqliteAdapter::with_config(connection_string, config.clone()).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseType::SQLite => Err(TableWardenError::configuration(
            "SQLite support not compiled in. Use --features sqlite",
        )),
    }
}

/// Safely redacts credentials from database connection URLs.
///
/// Delegates to [`crate::error::redact_database_url`].
#[inline]
pub fn redact_database_url(url: &str) -> String {
    crate::error::redact_database_url(url)
}

/// Detects database type from connection string.
///
/// # Errors
/// Returns error if connection string format is unrecognized
pub fn detect_database_type(connection_string: &str) -> Result<DatabaseType> {
    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        Ok(DatabaseType::PostgreSQL)
    } else if connection_string.starts_with("mysql://") {
        Ok(DatabaseType::MySQL)
    } else if connection_string.starts_with("sqlite:")
        || connection_string == ":memory:"
        || connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        Ok(DatabaseType::SQLite)
    } else {
        Err(TableWardenError::configuration(
            "Unrecognized database connection string format",
        ))
    }
}

// Shared helper utilities
pub mod helpers;

// Database-specific adapter modules
#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;
