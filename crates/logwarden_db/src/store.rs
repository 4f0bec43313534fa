//! The checkpoint store seam.

use crate::error::{Result, StoreError};
use crate::types::CheckpointRecord;
use async_trait::async_trait;
use logwarden_ids::TenantKey;
use std::collections::HashMap;
use std::sync::Mutex;

/// Durable `TenantKey -> CheckpointRecord` mapping.
///
/// Writes are upserts with full-overwrite semantics.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &TenantKey) -> Result<Option<CheckpointRecord>>;

    async fn save(&self, key: &TenantKey, record: &CheckpointRecord) -> Result<()>;

    /// Delete a tenant's checkpoint. Returns whether a record existed.
    async fn remove(&self, key: &TenantKey) -> Result<bool>;

    async fn list(&self) -> Result<Vec<(TenantKey, CheckpointRecord)>>;
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<TenantKey, CheckpointRecord>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TenantKey, CheckpointRecord>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::invalid_record("checkpoint map lock poisoned"))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &TenantKey) -> Result<Option<CheckpointRecord>> {
        Ok(self.records()?.get(key).cloned())
    }

    async fn save(&self, key: &TenantKey, record: &CheckpointRecord) -> Result<()> {
        self.records()?.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &TenantKey) -> Result<bool> {
        Ok(self.records()?.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<(TenantKey, CheckpointRecord)>> {
        let mut all: Vec<_> = self
            .records()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}
