//! Connection pooling with bounded exponential-backoff retry.
//!
//! - One session per `(host, port, username)`
//! - Dead sessions are evicted lazily on the next `acquire`, never swept
//! - A fresh connect makes up to `max_attempts` attempts, each bounded by
//!   `attempt_timeout`, sleeping `base_delay * 2^attempt` in between
//! - Retries never span separate `acquire` calls

use super::{ConnectParams, ConnectionKey, Connector, RemoteSession};
use crate::config::{ServerConfig, SshConfig};
use crate::error::{IngestError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry schedule for fresh connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Sleep after the first failed attempt; doubles after each failure.
    pub base_delay: Duration,

    /// Upper bound on a single connect attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// 3 attempts, 30s each, sleeping 1s then 2s between them.
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        attempt_timeout: Duration::from_secs(30),
    };

    pub fn from_config(ssh: &SshConfig) -> Self {
        Self {
            max_attempts: ssh.max_attempts.max(1),
            base_delay: Duration::from_secs(ssh.backoff_base_secs),
            attempt_timeout: Duration::from_secs(ssh.connect_timeout_secs.max(1)),
        }
    }

    /// Sleep after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Every sleep a fully failed connect would incur.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|attempt| self.delay_after(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Long-lived session cache, owned by the content fetcher.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    handles: HashMap<ConnectionKey, Arc<dyn RemoteSession>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, retry: RetryPolicy) -> Self {
        Self {
            connector,
            retry,
            handles: HashMap::new(),
        }
    }

    /// Return the pooled session for this server, connecting if needed.
    ///
    /// The new session is pooled before it is returned.
    pub async fn acquire(&mut self, server: &ServerConfig) -> Result<Arc<dyn RemoteSession>> {
        let params = ConnectParams::from_server(server)?;
        let key = params.key();

        if let Some(handle) = self.handles.get(&key) {
            if handle.is_alive().await {
                return Ok(Arc::clone(handle));
            }
            debug!(connection = %key, "Evicting closed session");
            self.handles.remove(&key);
        }

        let handle = self.connect_with_retry(&params).await?;
        self.handles.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    async fn connect_with_retry(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteSession>> {
        let mut last_error = String::from("no attempt made");

        for attempt in 0..self.retry.max_attempts {
            let outcome =
                tokio::time::timeout(self.retry.attempt_timeout, self.connector.connect(params))
                    .await;

            match outcome {
                Ok(Ok(handle)) => {
                    info!(
                        host = %params.host,
                        port = params.port,
                        attempt = attempt + 1,
                        "SFTP connected"
                    );
                    return Ok(handle);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.retry.attempt_timeout)
                }
            }

            warn!(
                host = %params.host,
                port = params.port,
                attempt = attempt + 1,
                error = %last_error,
                "SFTP connect attempt failed"
            );

            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        Err(IngestError::ConnectFailure {
            host: params.host.clone(),
            port: params.port,
            attempts: self.retry.max_attempts,
            last_error,
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close and forget the pooled session for this server. The next
    /// `acquire` reconnects. Returns whether a session was pooled.
    pub async fn evict(&mut self, server: &ServerConfig) -> bool {
        let Ok(params) = ConnectParams::from_server(server) else {
            return false;
        };
        match self.handles.remove(&params.key()) {
            Some(handle) => {
                debug!(connection = %params.key(), "Evicting session after failure");
                handle.close().await;
                true
            }
            None => false,
        }
    }

    /// Disconnect and forget every pooled session.
    pub async fn close_all(&mut self) {
        for (key, handle) in self.handles.drain() {
            debug!(connection = %key, "Closing pooled session");
            handle.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::time::Instant;

    struct FakeSession {
        alive: AtomicBool,
    }

    #[async_trait]
    impl RemoteSession for FakeSession {
        async fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn read_file(&self, _path: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn close(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyConnector {
        failures: u32,
        hang: bool,
        attempts: AtomicU32,
        last: std::sync::Mutex<Option<Arc<FakeSession>>>,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                hang: false,
                attempts: AtomicU32::new(0),
                last: std::sync::Mutex::new(None),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }

        fn kill_last(&self) {
            if let Some(session) = self.last.lock().unwrap().as_ref() {
                session.alive.store(false, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self, _params: &ConnectParams) -> Result<Arc<dyn RemoteSession>> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if n < self.failures {
                return Err(IngestError::Remote("connection refused".into()));
            }
            let session = Arc::new(FakeSession {
                alive: AtomicBool::new(true),
            });
            *self.last.lock().unwrap() = Some(Arc::clone(&session));
            Ok(session)
        }
    }

    fn server(host: &str) -> ServerConfig {
        ServerConfig {
            server_id: "1".into(),
            host: host.into(),
            port: 22,
            username: Some("user".into()),
            password: Some("pass".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::DEFAULT;
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(RetryPolicy::from_config(&SshConfig::default()), policy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_live_session() {
        let connector = Arc::new(FlakyConnector::new(0));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let a = pool.acquire(&server("h1")).await.unwrap();
        let b = pool.acquire(&server("h1")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.attempts(), 1);
        assert_eq!(pool.len(), 1);

        pool.acquire(&server("h2")).await.unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_session_is_replaced_on_next_use() {
        let connector = Arc::new(FlakyConnector::new(0));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let first = pool.acquire(&server("h1")).await.unwrap();
        connector.kill_last();
        // still pooled until someone asks for it
        assert_eq!(pool.len(), 1);

        let second = pool.acquire(&server("h1")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.attempts(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_forces_reconnect() {
        let connector = Arc::new(FlakyConnector::new(0));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let first = pool.acquire(&server("h1")).await.unwrap();
        assert!(pool.evict(&server("h1")).await);
        assert!(!first.is_alive().await);
        assert!(pool.is_empty());
        assert!(!pool.evict(&server("h1")).await);

        let second = pool.acquire(&server("h1")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let connector = Arc::new(FlakyConnector::new(2));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let started = Instant::now();
        pool.acquire(&server("h1")).await.unwrap();

        assert_eq!(connector.attempts(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_terminal() {
        let connector = Arc::new(FlakyConnector::new(u32::MAX));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let err = pool.acquire(&server("h1")).await.err().unwrap();
        assert!(matches!(err, IngestError::ConnectFailure { attempts: 3, .. }));
        assert_eq!(connector.attempts(), 3);
        assert!(pool.is_empty());

        // a new acquire starts a fresh retry cycle
        let _ = pool.acquire(&server("h1")).await;
        assert_eq!(connector.attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let mut connector = FlakyConnector::new(0);
        connector.hang = true;
        let connector = Arc::new(connector);
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let started = Instant::now();
        let err = pool.acquire(&server("h1")).await.err().unwrap();
        assert!(matches!(err, IngestError::ConnectFailure { .. }));
        // 3 x 30s timeouts plus 1s + 2s backoff
        assert_eq!(started.elapsed(), Duration::from_secs(93));
    }

    #[tokio::test]
    async fn test_incomplete_config_makes_no_attempt() {
        let connector = Arc::new(FlakyConnector::new(0));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);

        let mut config = server("h1");
        config.password = None;
        let err = pool.acquire(&config).await.err().unwrap();
        assert!(matches!(err, IngestError::ConfigIncomplete { .. }));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_close_all_drains_pool() {
        let connector = Arc::new(FlakyConnector::new(0));
        let mut pool = ConnectionPool::new(connector.clone(), RetryPolicy::DEFAULT);
        let handle = pool.acquire(&server("h1")).await.unwrap();

        pool.close_all().await;
        assert!(pool.is_empty());
        assert!(!handle.is_alive().await);
    }
}
