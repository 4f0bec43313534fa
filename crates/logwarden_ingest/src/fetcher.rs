//! Log content retrieval: remote first, then the local copy, then (in
//! development only) a generated fixture.

use crate::config::{IngestConfig, TenantConfig};
use crate::error::{IngestError, Result};
use crate::remote::ConnectionPool;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sample log written when `dev_fixtures` is on and nothing else exists.
pub const FIXTURE_LOG: &str = "\
[2025.05.30-12.20.00:000] LogSFPS: Mission GA_Airport_mis_01_SFPSACMission switched to READY
[2025.05.30-12.20.15:000] LogNet: Join request: /Game/Maps/world_1/World_1?Name=TestPlayer&eosid=|abc123def456
[2025.05.30-12.20.20:000] LogOnline: Warning: Player |abc123def456 successfully registered!
[2025.05.30-12.20.30:000] LogSFPS: Mission GA_Airport_mis_01_SFPSACMission switched to IN_PROGRESS
[2025.05.30-12.25.00:000] LogSFPS: Mission GA_Airport_mis_01_SFPSACMission switched to COMPLETED
[2025.05.30-12.25.15:000] UChannel::Close: Sending CloseBunch UniqueId: EOS:|abc123def456
";

const REMOTE_READ_ATTEMPTS: u32 = 2;

/// Where fetched content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Remote,
    Local,
    Fixture,
}

impl ContentSource {
    /// Name recorded in checkpoints. Fixtures live at the local path, so
    /// they count as local.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Remote => "remote",
            ContentSource::Local | ContentSource::Fixture => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedLog {
    pub content: String,
    pub source: ContentSource,
}

/// Log path relative to the remote login directory or the local root.
pub fn log_relative_path(host: &str, server_id: &str, file_name: &str) -> PathBuf {
    Path::new(&format!("{}_{}", host, server_id))
        .join("Logs")
        .join(file_name)
}

/// Remote path as the SFTP server expects it.
pub fn remote_log_path(host: &str, server_id: &str, file_name: &str) -> String {
    format!("./{}_{}/Logs/{}", host, server_id, file_name)
}

/// Fetches a tenant's full log, owning the connection pool.
pub struct ContentFetcher {
    pool: ConnectionPool,
    local_root: PathBuf,
    log_file_name: String,
    dev_fixtures: bool,
}

impl ContentFetcher {
    pub fn new(pool: ConnectionPool, config: &IngestConfig) -> Self {
        Self {
            pool,
            local_root: config.local_root.clone(),
            log_file_name: config.log_file_name.clone(),
            dev_fixtures: config.dev_fixtures,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ConnectionPool {
        &mut self.pool
    }

    /// Full log text for one tenant.
    ///
    /// Remote failures of any kind (incomplete config, exhausted retries,
    /// missing file) fall through to the local copy. `NotAvailable` means
    /// every source came up empty.
    pub async fn fetch(&mut self, tenant: &TenantConfig) -> Result<FetchedLog> {
        let key = tenant.key();
        let host = tenant.server.host.trim();
        let server_id = key.server.as_str();

        if let Some(content) = self.fetch_remote(tenant, host, server_id).await {
            return Ok(FetchedLog {
                content,
                source: ContentSource::Remote,
            });
        }

        let local_path = self
            .local_root
            .join(log_relative_path(host, server_id, &self.log_file_name));
        debug!(tenant = %key, path = %local_path.display(), "Falling back to local log");

        match tokio::fs::read_to_string(&local_path).await {
            Ok(content) => {
                info!(tenant = %key, bytes = content.len(), "Read local log");
                Ok(FetchedLog {
                    content,
                    source: ContentSource::Local,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound && self.dev_fixtures => {
                write_fixture(&local_path).await?;
                info!(tenant = %key, path = %local_path.display(), "Created fixture log");
                Ok(FetchedLog {
                    content: FIXTURE_LOG.to_string(),
                    source: ContentSource::Fixture,
                })
            }
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(tenant = %key, error = %e, "Local log read failed");
                }
                Err(IngestError::NotAvailable(key))
            }
        }
    }

    /// A read error drops the pooled session and reconnects once before
    /// giving up on the remote.
    async fn fetch_remote(
        &mut self,
        tenant: &TenantConfig,
        host: &str,
        server_id: &str,
    ) -> Option<String> {
        let path = remote_log_path(host, server_id, &self.log_file_name);

        for attempt in 1..=REMOTE_READ_ATTEMPTS {
            let session = match self.pool.acquire(&tenant.server).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(host, server_id, error = %e, "No remote session");
                    return None;
                }
            };

            match session.read_file(&path).await {
                Ok(Some(content)) => {
                    info!(path = %path, bytes = content.len(), "Read remote log");
                    return Some(content);
                }
                Ok(None) => {
                    warn!(path = %path, "Remote log not found");
                    return None;
                }
                Err(e) => {
                    warn!(path = %path, attempt, error = %e, "Remote log read failed");
                    self.pool.evict(&tenant.server).await;
                }
            }
        }
        None
    }
}

async fn write_fixture(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, FIXTURE_LOG).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::remote::{ConnectParams, Connector, RemoteSession, RetryPolicy};
    use async_trait::async_trait;
    use logwarden_ids::GuildId;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FileSession {
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl RemoteSession for FileSession {
        async fn is_alive(&self) -> bool {
            true
        }

        async fn read_file(&self, path: &str) -> Result<Option<String>> {
            Ok(self.files.get(path).cloned())
        }

        async fn close(&self) {}
    }

    struct FileConnector {
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl Connector for FileConnector {
        async fn connect(&self, _params: &ConnectParams) -> Result<Arc<dyn RemoteSession>> {
            Ok(Arc::new(FileSession {
                files: self.files.clone(),
            }))
        }
    }

    /// Every session it hands out fails its first `broken` reads in total.
    struct BrokenThenFine {
        content: String,
        broken: AtomicU32,
        connects: AtomicU32,
    }

    struct SharedSession(Arc<BrokenThenFine>);

    #[async_trait]
    impl RemoteSession for SharedSession {
        async fn is_alive(&self) -> bool {
            true
        }

        async fn read_file(&self, _path: &str) -> Result<Option<String>> {
            let left = self.0.broken.load(Ordering::SeqCst);
            if left > 0 {
                self.0.broken.store(left - 1, Ordering::SeqCst);
                return Err(IngestError::Remote("channel closed".into()));
            }
            Ok(Some(self.0.content.clone()))
        }

        async fn close(&self) {}
    }

    struct SharedConnector(Arc<BrokenThenFine>);

    #[async_trait]
    impl Connector for SharedConnector {
        async fn connect(&self, _params: &ConnectParams) -> Result<Arc<dyn RemoteSession>> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(SharedSession(Arc::clone(&self.0))))
        }
    }

    fn flaky_fetcher(root: &Path, broken: u32) -> (ContentFetcher, Arc<BrokenThenFine>) {
        let remote = Arc::new(BrokenThenFine {
            content: "remote line\n".into(),
            broken: AtomicU32::new(broken),
            connects: AtomicU32::new(0),
        });
        let pool = ConnectionPool::new(
            Arc::new(SharedConnector(Arc::clone(&remote))),
            RetryPolicy::DEFAULT,
        );
        let config = IngestConfig {
            local_root: root.to_path_buf(),
            ..IngestConfig::default()
        };
        (ContentFetcher::new(pool, &config), remote)
    }

    fn fetcher(root: &Path, remote: &[(&str, &str)], dev_fixtures: bool) -> ContentFetcher {
        let connector = FileConnector {
            files: remote
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let pool = ConnectionPool::new(Arc::new(connector), RetryPolicy::DEFAULT);
        let config = IngestConfig {
            local_root: root.to_path_buf(),
            dev_fixtures,
            ..IngestConfig::default()
        };
        ContentFetcher::new(pool, &config)
    }

    fn tenant(password: Option<&str>) -> TenantConfig {
        TenantConfig {
            guild_id: GuildId::new("g1"),
            server: ServerConfig {
                server_id: "7".into(),
                host: "10.0.0.1".into(),
                port: 22,
                username: Some("user".into()),
                password: password.map(String::from),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            remote_log_path("10.0.0.1", "7", "Deadside.log"),
            "./10.0.0.1_7/Logs/Deadside.log"
        );
        assert_eq!(
            log_relative_path("10.0.0.1", "7", "Deadside.log"),
            PathBuf::from("10.0.0.1_7/Logs/Deadside.log")
        );
    }

    #[tokio::test]
    async fn test_remote_wins() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = fetcher(
            temp.path(),
            &[("./10.0.0.1_7/Logs/Deadside.log", "remote line\n")],
            false,
        );

        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Remote);
        assert_eq!(log.content, "remote line\n");
        assert_eq!(fetcher.pool().len(), 1);
    }

    #[tokio::test]
    async fn test_read_error_reconnects_once() {
        let temp = TempDir::new().unwrap();
        let (mut fetcher, remote) = flaky_fetcher(temp.path(), 1);

        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Remote);
        assert_eq!(log.content, "remote line\n");
        assert_eq!(remote.connects.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.pool().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_read_errors_fall_back_to_local() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("10.0.0.1_7/Logs/Deadside.log");
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, "local line\n").unwrap();
        let (mut fetcher, remote) = flaky_fetcher(temp.path(), 2);

        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Local);
        assert_eq!(remote.connects.load(Ordering::SeqCst), 2);
        assert!(fetcher.pool().is_empty());
    }

    #[test]
    fn test_fixture_counts_as_local_source() {
        assert_eq!(ContentSource::Remote.as_str(), "remote");
        assert_eq!(ContentSource::Local.as_str(), "local");
        assert_eq!(ContentSource::Fixture.as_str(), "local");
    }

    #[tokio::test]
    async fn test_missing_remote_file_falls_back_to_local() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("10.0.0.1_7/Logs/Deadside.log");
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, "local line\n").unwrap();

        let mut fetcher = fetcher(temp.path(), &[], false);
        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Local);
        assert_eq!(log.content, "local line\n");
    }

    #[tokio::test]
    async fn test_incomplete_credentials_fall_back_to_local() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("10.0.0.1_7/Logs/Deadside.log");
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, "local line\n").unwrap();

        let mut fetcher = fetcher(temp.path(), &[], false);
        let log = fetcher.fetch(&tenant(None)).await.unwrap();
        assert_eq!(log.source, ContentSource::Local);
        assert!(fetcher.pool().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_available_without_fixtures() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = fetcher(temp.path(), &[], false);

        let err = fetcher.fetch(&tenant(Some("pw"))).await.unwrap_err();
        assert!(matches!(err, IngestError::NotAvailable(_)));
        assert!(!temp.path().join("10.0.0.1_7").exists());
    }

    #[tokio::test]
    async fn test_fixture_is_written_in_dev_mode() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = fetcher(temp.path(), &[], true);

        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Fixture);
        assert_eq!(log.content.lines().count(), 6);

        let written =
            std::fs::read_to_string(temp.path().join("10.0.0.1_7/Logs/Deadside.log")).unwrap();
        assert_eq!(written, FIXTURE_LOG);

        // second fetch reads the file back as a local copy
        let log = fetcher.fetch(&tenant(Some("pw"))).await.unwrap();
        assert_eq!(log.source, ContentSource::Local);
    }
}
