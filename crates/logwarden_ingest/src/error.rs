//! Error types for the ingestion engine

use logwarden_ids::TenantKey;
use std::io;
use thiserror::Error;

/// Ingestion error type.
///
/// None of these are fatal to the process: each is isolated to one tenant,
/// one line or one event by the coordinator.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing host, username or password. No network attempt is made.
    #[error("Incomplete connection config for {host}: missing {missing}")]
    ConfigIncomplete { host: String, missing: &'static str },

    /// Tenant config has no usable host or server id.
    #[error("Invalid config for tenant {tenant}: {reason}")]
    InvalidConfig { tenant: TenantKey, reason: String },

    /// Every connect attempt failed or timed out.
    #[error("Failed to connect to {host}:{port} after {attempts} attempts: {last_error}")]
    ConnectFailure {
        host: String,
        port: u16,
        attempts: u32,
        last_error: String,
    },

    /// No content from the remote, the local cache or a fixture.
    #[error("No log content available for tenant {0}")]
    NotAvailable(TenantKey),

    #[error("Line {line}: {reason}")]
    ParseLine { line: usize, reason: String },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Checkpoint persistence failed: {0}")]
    Persistence(#[from] logwarden_db::StoreError),

    /// Remote session error (handshake, auth, SFTP).
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IngestError>;

impl From<ssh2::Error> for IngestError {
    fn from(err: ssh2::Error) -> Self {
        IngestError::Remote(err.to_string())
    }
}
