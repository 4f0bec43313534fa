//! Checkpoint persistence for Logwarden.
//!
//! One record per tenant tracks how many complete log lines have been
//! consumed and whether the tenant's cold start has finished.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logwarden_db::{CheckpointDb, CheckpointStore};
//!
//! let db = CheckpointDb::open("~/.logwarden/checkpoints.sqlite3").await?;
//! let record = db.load(&tenant).await?;
//! ```

mod checkpoints;
mod error;
mod schema;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use store::{CheckpointStore, MemoryCheckpointStore};
pub use types::CheckpointRecord;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// SQLite-backed checkpoint store.
#[derive(Clone)]
pub struct CheckpointDb {
    pool: SqlitePool,
}

impl CheckpointDb {
    /// Open or create a database at the given path.
    ///
    /// Creates the checkpoint table if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema(true).await?;

        info!(path = %path.display(), "Checkpoint database opened");
        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(StoreError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema(true).await?;
        Ok(db)
    }

    /// Private in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.ensure_schema(false).await?;
        Ok(db)
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("checkpoints.db");

        let db = CheckpointDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = CheckpointDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
