use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much of a tenant's log has been consumed.
///
/// Replaced wholesale after every processing pass; never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub line_count: u64,
    pub last_updated: DateTime<Utc>,
    pub cold_start_complete: bool,
    /// Where the counted text came from (`remote`, `local`, ...).
    pub source: Option<String>,
}

impl CheckpointRecord {
    /// Record written once a pass has seen `line_count` complete lines.
    pub fn completed(line_count: u64, at: DateTime<Utc>) -> Self {
        Self {
            line_count,
            last_updated: at,
            cold_start_complete: true,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
