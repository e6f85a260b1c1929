//! Database pool setup.

use std::time::Duration;

use curator_core::AppError;
use sqlx::any::AnyPoolOptions;

pub type DbPool = sqlx::AnyPool;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// SQL dialect behind the Any driver. Decided from the URL scheme at startup
/// so the schema bootstrap can pick the right DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbFlavor {
    Sqlite,
    MySql,
}

impl DbFlavor {
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        if url.starts_with("sqlite:") {
            Ok(DbFlavor::Sqlite)
        } else if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            Ok(DbFlavor::MySql)
        } else {
            Err(AppError::Config(format!(
                "Unsupported database URL scheme: {}",
                url
            )))
        }
    }
}

pub async fn connect(database_url: &str) -> Result<DbPool, AppError> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .map_err(AppError::Database)?;

    tracing::info!(flavor = ?DbFlavor::from_url(database_url)?, "Database pool connected");
    Ok(pool)
}
