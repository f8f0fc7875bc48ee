use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{path::Path, str::FromStr, time::Duration};

use crate::{config::DatabaseConfig, error::AppResult};

/// Opens a pool on a SQLite file, creating the file and its directory if needed.
/// Foreign key enforcement is on, which sqlx does by default for SQLite.
pub async fn connect(path: &str, config: &DatabaseConfig) -> AppResult<SqlitePool> {
    // Ensure the directory exists
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::error::AppError::Connectivity(e.to_string()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    tracing::debug!("Opened SQLite pool at {}", path);
    Ok(pool)
}

/// Single-connection in-memory pool. Every connection to `sqlite::memory:` is
/// its own database, so the one connection is never recycled.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap()
}
