//! Checkpoint operations on the SQLite store.

use crate::error::{Result, StoreError};
use crate::store::CheckpointStore;
use crate::types::CheckpointRecord;
use crate::CheckpointDb;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use logwarden_ids::TenantKey;
use sqlx::Row;

#[async_trait]
impl CheckpointStore for CheckpointDb {
    async fn load(&self, key: &TenantKey) -> Result<Option<CheckpointRecord>> {
        let row = sqlx::query(
            "SELECT guild_id, server_id, line_count, last_updated, cold_start_complete, source
             FROM ingest_checkpoints WHERE guild_id = ? AND server_id = ?",
        )
        .bind(key.guild.as_str())
        .bind(key.server.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &TenantKey, record: &CheckpointRecord) -> Result<()> {
        let line_count = i64::try_from(record.line_count).map_err(|_| {
            StoreError::invalid_record(format!("line_count {} out of range", record.line_count))
        })?;

        sqlx::query(
            r#"
            INSERT INTO ingest_checkpoints
                (guild_id, server_id, line_count, last_updated, cold_start_complete, source)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, server_id) DO UPDATE SET
                line_count = excluded.line_count,
                last_updated = excluded.last_updated,
                cold_start_complete = excluded.cold_start_complete,
                source = excluded.source
            "#,
        )
        .bind(key.guild.as_str())
        .bind(key.server.as_str())
        .bind(line_count)
        .bind(record.last_updated.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(record.cold_start_complete)
        .bind(record.source.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &TenantKey) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM ingest_checkpoints WHERE guild_id = ? AND server_id = ?")
                .bind(key.guild.as_str())
                .bind(key.server.as_str())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<(TenantKey, CheckpointRecord)>> {
        let rows = sqlx::query(
            "SELECT guild_id, server_id, line_count, last_updated, cold_start_complete, source
             FROM ingest_checkpoints ORDER BY guild_id, server_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let key = TenantKey::new(
                    row.get::<String, _>("guild_id").as_str(),
                    row.get::<String, _>("server_id").as_str(),
                );
                Ok((key, row_to_record(row)?))
            })
            .collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CheckpointRecord> {
    let line_count: i64 = row.get("line_count");
    let last_updated: String = row.get("last_updated");

    let line_count = u64::try_from(line_count)
        .map_err(|_| StoreError::invalid_record(format!("negative line_count {}", line_count)))?;
    let last_updated = DateTime::parse_from_rfc3339(&last_updated)
        .map_err(|e| StoreError::invalid_record(format!("last_updated '{}': {}", last_updated, e)))?
        .with_timezone(&Utc);

    Ok(CheckpointRecord {
        line_count,
        last_updated,
        cold_start_complete: row.get("cold_start_complete"),
        source: row.get("source"),
    })
}
