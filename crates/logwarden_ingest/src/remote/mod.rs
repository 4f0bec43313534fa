//! Remote log access: reusable SFTP sessions behind a small trait seam.

mod pool;
mod ssh;

pub use pool::{ConnectionPool, RetryPolicy};
pub use ssh::SshConnector;

use crate::config::ServerConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Pool key. At most one live session exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Validated credentials for one connect attempt.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ConnectParams {
    /// Fails with `ConfigIncomplete` when host, username or password is
    /// missing. Port 0 falls back to 22.
    pub fn from_server(server: &ServerConfig) -> Result<Self> {
        let host = server.host.trim();
        if host.is_empty() {
            return Err(IngestError::ConfigIncomplete {
                host: server.server_id.clone(),
                missing: "host",
            });
        }
        let username = non_empty(server.username.as_deref()).ok_or_else(|| {
            IngestError::ConfigIncomplete {
                host: host.to_string(),
                missing: "username",
            }
        })?;
        let password = non_empty(server.password.as_deref()).ok_or_else(|| {
            IngestError::ConfigIncomplete {
                host: host.to_string(),
                missing: "password",
            }
        })?;

        Ok(Self {
            host: host.to_string(),
            port: if server.port == 0 { 22 } else { server.port },
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A live remote file-transfer session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Whether the session can still be used. May probe the peer.
    async fn is_alive(&self) -> bool;

    /// Full contents of `path`, or `None` if the file does not exist.
    async fn read_file(&self, path: &str) -> Result<Option<String>>;

    async fn close(&self);
}

/// Opens new sessions. One call is one attempt; retries live in the pool.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteSession>>;
}
