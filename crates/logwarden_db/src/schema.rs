//! Checkpoint table creation.

use crate::error::Result;
use crate::CheckpointDb;
use tracing::debug;

impl CheckpointDb {
    /// Ensure the checkpoint table exists.
    pub(crate) async fn ensure_schema(&self, file_backed: bool) -> Result<()> {
        if file_backed {
            sqlx::query("PRAGMA journal_mode=WAL")
                .execute(&self.pool)
                .await?;
            sqlx::query("PRAGMA synchronous=NORMAL")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS ingest_checkpoints (
                guild_id TEXT NOT NULL,
                server_id TEXT NOT NULL,
                line_count INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                cold_start_complete INTEGER NOT NULL DEFAULT 0,
                source TEXT,
                PRIMARY KEY (guild_id, server_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Checkpoint schema verified");
        Ok(())
    }
}
