//! SQLite-based store using `SeaORM`.
//!
//! A single `SqliteStore` implements `DomainRepository` and `AdminRepository`
//! against one local `SQLite` database file. Timestamps are stored as Unix
//! seconds.

mod admin_repo;
mod domain_repo;
pub(crate) mod entity;
mod migration;

use std::path::Path;

use chrono::{DateTime, Utc};
use dns_failover_core::error::{CoreError, CoreResult};
use dns_failover_core::utils::datetime::from_unix;
use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use migration::Migrator;

/// SQLite-based store for domains, forwards and admins.
pub struct SqliteStore {
    /// Shared `SeaORM` database connection.
    pub(crate) db: DatabaseConnection,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations.
    ///
    /// # Errors
    /// Returns `CoreError::StorageError` if directory creation, database
    /// connection, or schema migration fails.
    pub async fn new(db_path: &Path) -> CoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::StorageError(format!("Failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = Database::connect(&db_url)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to connect to SQLite: {e}")))?;

        let store = Self { db };

        // Ensure schema is up to date before the store is used.
        Migrator::up(&store.db, None)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to run migrations: {e}")))?;

        log::info!("SQLite store opened at {}", db_path.display());
        Ok(store)
    }
}

/// `map_err` adapter: `DbErr` -> `StorageError` with context.
pub(crate) fn db_error(action: &'static str) -> impl Fn(DbErr) -> CoreError {
    move |e| CoreError::StorageError(format!("Failed to {action}: {e}"))
}

/// Required timestamp column.
pub(crate) fn timestamp(ts: i64, column: &str) -> CoreResult<DateTime<Utc>> {
    from_unix(ts)
        .ok_or_else(|| CoreError::SerializationError(format!("Invalid {column}: {ts}")))
}
