//! SQLite connection handling.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db`, `sqlite://./relative.db` or a bare path
//! - In-memory: `sqlite::memory:` or `:memory:`

use super::{ConnectionConfig, SqliteAdapter};
use crate::Result;
use sqlx::SqlitePool;
use url::Url;

impl SqliteAdapter {
    /// Creates a new SQLite adapter with default configuration.
    ///
    /// # Errors
    /// Returns error if the connection string is invalid or the database
    /// cannot be opened.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = parse_sqlite_connection_config(connection_string)?;
        Self::with_config(connection_string, config).await
    }

    /// Creates a new SQLite adapter with custom configuration.
    ///
    /// # Errors
    /// Returns error if the configuration or connection string is invalid
    /// or the database cannot be opened.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_sqlite_connection_string(connection_string)?;
        let pool = create_sqlite_connection(connection_string, &config).await?;

        Ok(Self {
            pool,
            config,
            connection_string: connection_string.to_string(),
        })
    }

    /// Checks if the connection is to an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        is_memory_connection(&self.connection_string)
    }
}

fn is_memory_connection(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Parses SQLite connection string into a configuration.
///
/// # Errors
/// Returns error if the connection string is not a SQLite location.
pub fn parse_sqlite_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
    validate_sqlite_connection_string(connection_string)?;

    let database_name = extract_database_name(connection_string);
    let mut config = ConnectionConfig::new("localhost".to_string()).with_database(database_name);
    config.schema = "main".to_string();
    config.max_connections = 1;
    config.min_idle_connections = 0;

    Ok(config)
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if is_memory_connection(connection_string) {
            return Ok(());
        }

        if let Ok(url) = Url::parse(connection_string) {
            if url.scheme() != "sqlite" {
                return Err(crate::error::TableWardenError::configuration(
                    "Connection string must use sqlite:// scheme",
                ));
            }
            return Ok(());
        }

        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(crate::error::TableWardenError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Extracts database name from connection string.
fn extract_database_name(connection_string: &str) -> String {
    if is_memory_connection(connection_string) {
        return ":memory:".to_string();
    }

    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);

    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

/// Opens the pool.
///
/// In-memory databases get exactly one connection with no idle or
/// lifetime expiry: a new connection would see an empty database.
async fn create_sqlite_connection(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<SqlitePool> {
    use sqlx::sqlite::SqliteConnectOptions;
    use std::str::FromStr;

    let normalized = normalize_connection_string(connection_string);

    let mut options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
        crate::error::TableWardenError::configuration(format!(
            "Invalid SQLite connection string: {}",
            e
        ))
    })?;

    options = if config.read_only {
        options.read_only(true)
    } else {
        options.create_if_missing(true)
    };

    let pool_options = if is_memory_connection(connection_string) {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
    };

    let pool = pool_options
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
        .map_err(crate::error::TableWardenError::connection_failed)?;

    tracing::debug!(
        "Opened SQLite database {}",
        config.database.as_deref().unwrap_or("main")
    );

    Ok(pool)
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}
