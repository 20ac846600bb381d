//! MySQL connection pool management and validation.

use super::{ConnectionConfig, MySqlAdapter};
use crate::Result;
use sqlx::MySqlPool;
use std::time::Duration;
use url::Url;

impl MySqlAdapter {
    /// Creates a new MySQL adapter with configuration parsed from the URL.
    ///
    /// # Errors
    /// Returns error if the connection string is invalid or the pool
    /// cannot be configured.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = parse_mysql_connection_config(connection_string)?;
        let pool = create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Creates a new MySQL adapter with custom configuration.
    ///
    /// # Errors
    /// Returns error if the configuration or connection string is invalid.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_mysql_connection_string(connection_string)?;
        let pool = create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }
}

/// Parses a MySQL URL into a configuration; the schema is the database name.
///
/// # Errors
/// Returns error if the connection string is malformed.
pub fn parse_mysql_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
    let url = validate_mysql_connection_string(connection_string)?;

    let mut config = ConnectionConfig::new(url.host_str().unwrap_or("localhost").to_string())
        .with_port(url.port().unwrap_or(3306));

    let database = url.path().trim_start_matches('/');
    if !database.is_empty() {
        config = config
            .with_database(database.to_string())
            .with_schema(database.to_string());
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
            "pool_max_conns" => {
                if let Ok(max_conns) = value.parse::<u32>()
                    && max_conns > 0
                    && max_conns <= 100
                {
                    config.max_connections = max_conns;
                }
            }
            _ => {}
        }
    }

    config.validate()?;
    Ok(config)
}

/// Validates the URL scheme and host.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_mysql_connection_string(connection_string: &str) -> Result<Url> {
    let url = Url::parse(connection_string).map_err(|e| {
        crate::error::TableWardenError::configuration(format!(
            "Invalid MySQL connection string format: {}",
            e
        ))
    })?;

    if url.scheme() != "mysql" {
        return Err(crate::error::TableWardenError::configuration(
            "Connection string must use mysql:// scheme",
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(crate::error::TableWardenError::configuration(
            "Connection string must specify a host",
        ));
    }

    Ok(url)
}

/// Creates a lazily connecting pool with per-session settings.
fn create_connection_pool(connection_string: &str, config: &ConnectionConfig) -> Result<MySqlPool> {
    use sqlx::Executor;

    let query_timeout_ms = config.query_timeout.as_millis();
    let read_only = config.read_only;

    let pool = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .min_connections(config.min_idle_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET max_execution_time = {}", query_timeout_ms).as_str())
                    .await?;

                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }

                conn.execute("SET time_zone = '+00:00'").await?;

                Ok(())
            })
        })
        .connect_lazy(connection_string)
        .map_err(|e| {
            tracing::error!(
                "Failed to create MySQL connection pool to {}",
                crate::adapters::redact_database_url(connection_string)
            );
            crate::error::TableWardenError::connection_failed(e)
        })?;

    Ok(pool)
}
