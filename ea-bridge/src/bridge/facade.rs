//! Bridge facade - accepts the agent connection and multiplexes commands over it.
//!
//! Flow:
//! 1. `start()` binds the listener and spawns the accept loop
//! 2. Each accepted socket replaces the current session (old one closed first)
//! 3. `send()` registers a pending slot on the current session, writes the
//!    request, and waits for the matching response or the deadline
//! 4. `stop()` closes the listener and the session, failing every waiter

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ea_bridge_wire::{Params, PeerRequest, RequestId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::BridgeError;
use super::session::Session;

/// Pause after a failed accept (e.g. fd exhaustion) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Command path used by the HTTP layer.
///
/// This abstraction enables testing the service and routes without a real
/// agent connection.
#[async_trait]
pub trait CommandSender: Send + Sync {
    /// Send a command and wait for the agent's answer.
    async fn send(
        &self,
        command: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError>;

    /// Whether a live agent connection exists.
    async fn connected(&self) -> bool;

    /// Last inbound activity from the agent, if it ever connected.
    async fn last_seen(&self) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 15555,
        }
    }
}

struct Listening {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Bridge {
    config: BridgeConfig,
    listening: tokio::sync::Mutex<Option<Listening>>,
    /// The one session commands are written to. Swapped under the write lock.
    current: RwLock<Option<Arc<Session>>>,
    /// Activity timestamp of the last session that was torn down.
    retired_last_seen: StdMutex<Option<DateTime<Utc>>>,
    next_session_id: AtomicU64,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            listening: tokio::sync::Mutex::new(None),
            current: RwLock::new(None),
            retired_last_seen: StdMutex::new(None),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Bind and start accepting agent connections. Returns the bound address.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr, BridgeError> {
        let mut listening = self.listening.lock().await;
        if listening.is_some() {
            return Err(BridgeError::AlreadyStarted);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let bind_err = |e: std::io::Error| BridgeError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!("Bridge listening on {}", local_addr);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            Arc::downgrade(self),
            listener,
            shutdown.clone(),
        ));

        *listening = Some(Listening {
            addr: local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.addr)
    }

    /// Adopt a newly accepted agent socket as the current session.
    async fn on_peer_connected(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let mut current = self.current.write().await;
        if let Some(previous) = current.take() {
            tracing::info!(
                session = previous.id(),
                peer = %previous.peer(),
                "Closing previous agent connection"
            );
            self.retire(&previous);
            previous.close("replaced by a new agent connection").await;
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session = id, %peer, "Agent connected");
        *current = Some(Session::spawn(id, stream, peer));
    }

    fn retire(&self, session: &Session) {
        if let Ok(mut last) = self.retired_last_seen.lock() {
            *last = session.last_seen();
        }
    }

    /// Send a command to the agent and wait for its response.
    ///
    /// The deadline covers both the write and the wait. A timed-out request is
    /// detached locally only; the agent may still act on it, and its late
    /// answer is discarded.
    pub async fn send(
        &self,
        command: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        let session = self
            .current
            .read()
            .await
            .clone()
            .filter(|s| s.is_live())
            .ok_or(BridgeError::NotConnected)?;

        let id = RequestId::new();
        let mut slot = session.pending().register(id.clone(), timeout)?;
        let deadline = tokio::time::Instant::from_std(slot.deadline());
        let request = PeerRequest::new(id.clone(), command, params);

        tracing::debug!(session = session.id(), request_id = %id, command, "Sending command");

        let exchange = async {
            session.write(request).await?;
            slot.recv().await
        };

        match tokio::time::timeout_at(deadline, exchange).await {
            Ok(Ok(response)) => response.into_outcome().map_err(|error| {
                tracing::debug!(request_id = %id, command, %error, "Agent reported an error");
                BridgeError::Remote(error)
            }),
            Ok(Err(e)) => {
                session.pending().cancel(&id);
                Err(e)
            }
            Err(_) => {
                session.pending().cancel(&id);
                tracing::warn!(
                    request_id = %id,
                    command,
                    timeout_secs = timeout.as_secs_f64(),
                    "Command timed out"
                );
                Err(BridgeError::Timeout {
                    command: command.to_string(),
                    after: timeout,
                })
            }
        }
    }

    /// Close the listener and the current session. Every pending caller is
    /// failed with Disconnected. The bridge can be started again afterwards.
    pub async fn stop(&self) {
        let listening = self.listening.lock().await.take();
        if let Some(listening) = listening {
            listening.shutdown.cancel();
            if let Err(e) = listening.task.await {
                tracing::error!(error = %e, "Accept loop panicked");
            }
            tracing::info!(addr = %listening.addr, "Bridge listener closed");
        }

        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            self.retire(&session);
            session.close("bridge shutting down").await;
        }
    }

    pub async fn connected(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.is_live())
    }

    pub async fn last_seen(&self) -> Option<DateTime<Utc>> {
        if let Some(session) = self.current.read().await.as_ref() {
            return session.last_seen();
        }
        self.retired_last_seen.lock().ok().and_then(|last| *last)
    }

    pub(crate) async fn current_session(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl CommandSender for Bridge {
    async fn send(
        &self,
        command: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        Bridge::send(self, command, params, timeout).await
    }

    async fn connected(&self) -> bool {
        Bridge::connected(self).await
    }

    async fn last_seen(&self) -> Option<DateTime<Utc>> {
        Bridge::last_seen(self).await
    }
}

async fn accept_loop(bridge: Weak<Bridge>, listener: TcpListener, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let Some(bridge) = bridge.upgrade() else {
                        break;
                    };
                    bridge.on_peer_connected(stream, peer).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept agent connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
    tracing::debug!("Accept loop exiting");
}
