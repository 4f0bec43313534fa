//! Configuration for the ingestion daemon

use crate::error::{IngestError, Result};
use logwarden_ids::{ChannelId, GuildId, ServerId, TenantKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host or server id values that mean "not configured".
const PLACEHOLDERS: &[&str] = &["", "unknown", "none", "changeme"];

/// Main configuration for the ingestion daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Path to the SQLite checkpoint database
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Seconds between ingestion passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Root for local fallback copies of remote logs
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// File name under `{host}_{server}/Logs/`
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    /// Write a fixture log when neither remote nor local content exists.
    /// Development only.
    #[serde(default)]
    pub dev_fixtures: bool,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub guilds: Vec<GuildConfig>,
}

fn default_database_path() -> String {
    logwarden_home()
        .map(|home| home.join("checkpoints.sqlite3"))
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "checkpoints.sqlite3".to_string())
}

fn logwarden_home() -> Option<PathBuf> {
    std::env::var_os("LOGWARDEN_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".logwarden")))
}

fn default_poll_interval() -> u64 {
    180
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_file_name() -> String {
    "Deadside.log".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            poll_interval_secs: default_poll_interval(),
            local_root: default_local_root(),
            log_file_name: default_log_file_name(),
            dev_fixtures: false,
            ssh: SshConfig::default(),
            guilds: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Every enabled (guild, server) pair, in config order.
    pub fn tenants(&self) -> Vec<TenantConfig> {
        self.guilds
            .iter()
            .flat_map(|guild| {
                guild
                    .servers
                    .iter()
                    .filter(|server| server.enabled)
                    .map(move |server| TenantConfig {
                        guild_id: guild.guild_id.clone(),
                        server: server.clone(),
                    })
            })
            .collect()
    }

    pub fn guild(&self, guild_id: &GuildId) -> Option<&GuildConfig> {
        self.guilds.iter().find(|g| &g.guild_id == guild_id)
    }
}

/// SSH session parameters.
///
/// The algorithm lists default to a legacy-compatible set that older game
/// hosts still require.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep after failed attempt `n` (0-based) is `base * 2^n`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_host_key_algorithms")]
    pub host_key_algorithms: Vec<String>,

    #[serde(default = "default_kex_algorithms")]
    pub kex_algorithms: Vec<String>,

    #[serde(default = "default_ciphers")]
    pub ciphers: Vec<String>,

    #[serde(default = "default_macs")]
    pub macs: Vec<String>,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_host_key_algorithms() -> Vec<String> {
    strings(&["ssh-rsa", "rsa-sha2-256", "rsa-sha2-512"])
}

fn default_kex_algorithms() -> Vec<String> {
    strings(&[
        "diffie-hellman-group14-sha256",
        "diffie-hellman-group16-sha512",
        "ecdh-sha2-nistp256",
        "ecdh-sha2-nistp384",
        "ecdh-sha2-nistp521",
    ])
}

fn default_ciphers() -> Vec<String> {
    strings(&[
        "aes128-ctr",
        "aes192-ctr",
        "aes256-ctr",
        "aes128-gcm@openssh.com",
        "aes256-gcm@openssh.com",
    ])
}

fn default_macs() -> Vec<String> {
    strings(&["hmac-sha2-256", "hmac-sha1"])
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            host_key_algorithms: default_host_key_algorithms(),
            kex_algorithms: default_kex_algorithms(),
            ciphers: default_ciphers(),
            macs: default_macs(),
        }
    }
}

/// One guild and the game servers it watches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: GuildId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub channels: ChannelConfig,
}

/// Connection details for one game server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_port() -> u16 {
    22
}

fn default_enabled() -> bool {
    true
}

/// A server paired with the guild that owns it.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub guild_id: GuildId,
    pub server: ServerConfig,
}

impl TenantConfig {
    /// The tenant key, without validation.
    pub fn key(&self) -> TenantKey {
        TenantKey::new(self.guild_id.clone(), ServerId::new(self.server.server_id.trim()))
    }

    /// Reject tenants whose host or server id is absent or a placeholder.
    pub fn validate(&self) -> Result<TenantKey> {
        let key = self.key();
        if is_placeholder(&self.server.host) {
            return Err(IngestError::InvalidConfig {
                tenant: key,
                reason: format!("host '{}' is not configured", self.server.host),
            });
        }
        if is_placeholder(&self.server.server_id) {
            return Err(IngestError::InvalidConfig {
                tenant: key,
                reason: format!("server id '{}' is not configured", self.server.server_id),
            });
        }
        Ok(key)
    }

    pub fn display_name(&self) -> &str {
        if self.server.name.is_empty() {
            &self.server.server_id
        } else {
            &self.server.name
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim().to_ascii_lowercase();
    PLACEHOLDERS.contains(&trimmed.as_str())
}

/// Channel ids per notification kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<ChannelId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ChannelId>,

    /// Catch-all channel used when no category channel is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killfeed: Option<ChannelId>,

    /// Channel whose name shows the online player count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<ChannelId>,
}

/// Guild routing table: per-server overrides, a guild default and the
/// legacy guild-wide map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub servers: BTreeMap<String, ChannelMap>,

    #[serde(default)]
    pub default: ChannelMap,

    #[serde(default)]
    pub legacy: ChannelMap,
}
