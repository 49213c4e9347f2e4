//! SQLite-backed fallback persistence.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::repository::{FallbackStore, Storage};

mod fallback_repo;
mod mapping;
mod migrate;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pool sizing and lock waiting for a fallback database.
///
/// Fallback writes are rare and small, so a handful of connections is plenty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteOptions {
    fn pragmas(&self) -> [String; 3] {
        [
            "PRAGMA foreign_keys = ON;".to_owned(),
            "PRAGMA journal_mode = WAL;".to_owned(),
            format!("PRAGMA busy_timeout = {};", self.busy_timeout.as_millis()),
        ]
    }
}

/// Fallback store over a `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect with default [`SqliteOptions`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or a
    /// connection pragma fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqliteOptions::default()).await
    }

    /// Connect and apply the connection pragmas to every pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or a
    /// connection pragma fails.
    pub async fn connect_with(
        database_url: &str,
        options: SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let pragmas = options.pragmas();
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .after_connect(move |conn, _meta| {
                let pragmas = pragmas.clone();
                Box::pin(async move {
                    for pragma in &pragmas {
                        sqlx::query(pragma.as_str()).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration fails; the failing version is
    /// rolled back.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::apply_pending(&self.pool).await
    }
}

impl Storage {
    /// Open, migrate and wrap a `SQLite` fallback store.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let fallback: Arc<dyn FallbackStore> = Arc::new(repo);
        Ok(Self { fallback })
    }
}
