//! PostgreSQL connection pool management and validation.
//!
//! # Security Features
//! - Validates connection string format and parameters
//! - Enforces connection limits to prevent resource exhaustion
//! - Sets appropriate timeouts for all operations

use super::{ConnectionConfig, PostgresAdapter};
use crate::Result;
use crate::models::DatabaseType;
use crate::statement::quote_identifier;
use sqlx::PgPool;
use std::time::Duration;
use url::Url;

impl PostgresAdapter {
    /// Creates a new PostgreSQL adapter with configuration parsed from the URL.
    ///
    /// # Errors
    /// Returns error if the connection string is invalid or the pool
    /// cannot be configured.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string)?;
        let pool = Self::create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Creates a new PostgreSQL adapter with custom configuration.
    ///
    /// # Errors
    /// Returns error if the configuration or connection string is invalid.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::validate_connection_string(connection_string)?;
        let pool = Self::create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Parses connection string to extract configuration parameters.
    ///
    /// Recognized query parameters: `connect_timeout` (seconds),
    /// `statement_timeout` (milliseconds), `pool_max_conns` and `schema`.
    ///
    /// # Errors
    /// Returns error if connection string is malformed
    pub fn parse_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
        Self::validate_connection_string(connection_string)?;

        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::TableWardenError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        let mut config = ConnectionConfig::new(url.host_str().unwrap_or("localhost").to_string())
            .with_port(url.port().unwrap_or(5432));

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            config = config.with_database(database.to_string());
        }

        if !url.username().is_empty() {
            config = config.with_username(url.username().to_string());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    if let Ok(timeout_secs) = value.parse::<u64>()
                        && timeout_secs > 0
                        && timeout_secs <= 300
                    {
                        config.connect_timeout = Duration::from_secs(timeout_secs);
                    }
                }
                "statement_timeout" => {
                    if let Ok(timeout_ms) = value.parse::<u64>()
                        && timeout_ms > 0
                        && timeout_ms <= 300_000
                    {
                        config.query_timeout = Duration::from_millis(timeout_ms);
                    }
                }
                "pool_max_conns" => {
                    if let Ok(max_conns) = value.parse::<u32>()
                        && max_conns > 0
                        && max_conns <= 100
                    {
                        config.max_connections = max_conns;
                    }
                }
                "schema" if !value.trim().is_empty() => {
                    config.schema = value.to_string();
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Creates a lazily connecting pool.
    ///
    /// Every new connection gets the statement timeout, the configured
    /// schema as `search_path`, UTC timestamps and, when requested,
    /// read-only transactions.
    pub(crate) fn create_connection_pool(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        use sqlx::Executor;

        Self::validate_connection_string(connection_string)?;

        let query_timeout_ms = config.query_timeout.as_millis();
        let read_only = config.read_only;
        let search_path = quote_identifier(DatabaseType::PostgreSQL, &config.schema);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .min_connections(config.min_idle_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = {}", query_timeout_ms).as_str(),
                    )
                    .await?;

                    conn.execute(format!("SET search_path TO {}", search_path).as_str())
                        .await?;

                    let app_name = format!("tablewarden-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;

                    if read_only {
                        conn.execute("SET default_transaction_read_only = on")
                            .await?;
                    }

                    conn.execute("SET timezone = 'UTC'").await?;

                    Ok(())
                })
            })
            .connect_lazy(connection_string)
            .map_err(|e| {
                tracing::error!(
                    "Failed to create PostgreSQL connection pool to {}",
                    crate::adapters::redact_database_url(connection_string)
                );
                crate::error::TableWardenError::connection_failed(e)
            })?;

        Ok(pool)
    }

    /// Validates connection string format.
    ///
    /// # Errors
    /// Returns error if connection string is invalid
    pub fn validate_connection_string(connection_string: &str) -> Result<()> {
        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::TableWardenError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(crate::error::TableWardenError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(crate::error::TableWardenError::configuration(
                "Connection string must specify a host",
            ));
        }

        Ok(())
    }
}
