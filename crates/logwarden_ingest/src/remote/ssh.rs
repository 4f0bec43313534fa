//! libssh2-backed SFTP sessions.
//!
//! libssh2 is blocking, so every call runs on the blocking pool. A session
//! that fails any I/O is marked closed and is replaced on its next acquire.

use super::{ConnectParams, Connector, RemoteSession};
use crate::config::SshConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use ssh2::{ErrorCode, MethodType, Session};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Seconds between keepalive probes.
const KEEPALIVE_INTERVAL: u32 = 60;

/// Opens password-authenticated SFTP sessions.
pub struct SshConnector {
    ssh: SshConfig,
}

impl SshConnector {
    pub fn new(ssh: SshConfig) -> Self {
        Self { ssh }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.connect_timeout_secs.max(1))
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteSession>> {
        let params = params.clone();
        let ssh = self.ssh.clone();
        let timeout = self.timeout();

        let session = tokio::task::spawn_blocking(move || open_session(&params, &ssh, timeout))
            .await
            .map_err(|e| IngestError::Remote(format!("connect task failed: {e}")))??;

        Ok(Arc::new(SshSession {
            inner: Arc::new(Mutex::new(session)),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

fn open_session(params: &ConnectParams, ssh: &SshConfig, timeout: Duration) -> Result<Session> {
    let addr = (params.host.as_str(), params.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| IngestError::Remote(format!("cannot resolve {}", params.host)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);

    let prefs = [
        (MethodType::HostKey, &ssh.host_key_algorithms),
        (MethodType::Kex, &ssh.kex_algorithms),
        (MethodType::CryptCs, &ssh.ciphers),
        (MethodType::CryptSc, &ssh.ciphers),
        (MethodType::MacCs, &ssh.macs),
        (MethodType::MacSc, &ssh.macs),
    ];
    for (method, algorithms) in prefs {
        if !algorithms.is_empty() {
            session.method_pref(method, &algorithms.join(","))?;
        }
    }

    session.handshake()?;
    session.userauth_password(&params.username, &params.password)?;
    if !session.authenticated() {
        return Err(IngestError::Remote(format!(
            "authentication rejected for {}@{}",
            params.username, params.host
        )));
    }
    session.set_keepalive(true, KEEPALIVE_INTERVAL);

    debug!(host = %params.host, port = params.port, "SSH session established");
    Ok(session)
}

/// One authenticated session. Each read opens a fresh SFTP channel.
pub struct SshSession {
    inner: Arc<Mutex<Session>>,
    closed: Arc<AtomicBool>,
}

impl SshSession {
    async fn with_session<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let session = inner
                .lock()
                .map_err(|_| IngestError::Remote("session lock poisoned".into()))?;
            op(&session)
        })
        .await
        .map_err(|e| IngestError::Remote(format!("session task failed: {e}")))?
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let probe = self
            .with_session(|session| {
                if !session.authenticated() {
                    return Ok(false);
                }
                // needs a round trip, unlike keepalive_send
                session.sftp()?.stat(Path::new("."))?;
                Ok(true)
            })
            .await;

        match probe {
            Ok(alive) => alive,
            Err(e) => {
                debug!(error = %e, "Liveness probe failed");
                self.closed.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        let path = path.to_string();
        let result = self
            .with_session(move |session| {
                let sftp = session.sftp()?;
                let mut file = match sftp.open(Path::new(&path)) {
                    Ok(file) => file,
                    Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            })
            .await;

        if let Err(e) = &result {
            warn!(error = %e, "SFTP read failed, marking session closed");
            self.closed.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let result = self
            .with_session(|session| {
                session.disconnect(None, "closing", None)?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            debug!(error = %e, "SSH disconnect failed");
        }
    }
}
