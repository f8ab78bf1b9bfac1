//! Connection session: one live agent socket.
//!
//! A session owns the socket for its whole life:
//! - all writes go through one async mutex, so frames never interleave
//! - one receive loop decodes frames and resolves the session's pending table
//! - when the loop ends (hang-up, I/O error, bad frame, or close) the session
//!   is dead for good and every pending caller is failed
//!
//! Each session has its own pending table, so a stale session can only ever
//! touch requests that were written through it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use chrono::{DateTime, Utc};
use ea_bridge_wire::{JsonCodec, PeerRequest, PeerResponse};
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use super::error::BridgeError;
use super::pending::PendingRequests;

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Closed by the bridge (replacement or shutdown).
    Closed(String),
    /// Agent closed its end of the stream.
    PeerHangup,
    /// Socket failed underneath the framing.
    Io(String),
    /// Agent sent an oversized or malformed frame.
    Protocol(String),
}

impl SessionEnd {
    fn reason(&self) -> String {
        match self {
            Self::Closed(reason) => reason.clone(),
            Self::PeerHangup => "agent closed the connection".to_string(),
            Self::Io(e) => format!("connection error: {e}"),
            Self::Protocol(e) => format!("protocol error: {e}"),
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

pub struct Session {
    id: u64,
    peer: SocketAddr,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, JsonCodec<PeerRequest>>>,
    pending: Arc<PendingRequests>,
    live: AtomicBool,
    /// Last inbound activity, unix millis.
    last_seen: AtomicI64,
    shutdown: CancellationToken,
    reader: StdMutex<Option<JoinHandle<()>>>,
    end: OnceLock<SessionEnd>,
}

impl Session {
    /// Take ownership of an accepted socket and start its receive loop.
    pub fn spawn(id: u64, stream: TcpStream, peer: SocketAddr) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();

        let session = Arc::new(Self {
            id,
            peer,
            writer: tokio::sync::Mutex::new(FramedWrite::new(
                write_half,
                JsonCodec::<PeerRequest>::new(),
            )),
            pending: PendingRequests::new(),
            live: AtomicBool::new(true),
            last_seen: AtomicI64::new(Utc::now().timestamp_millis()),
            shutdown: CancellationToken::new(),
            reader: StdMutex::new(None),
            end: OnceLock::new(),
        });

        let reader = FramedRead::new(read_half, JsonCodec::<PeerResponse>::new());
        let handle = tokio::spawn(run_receive_loop(Arc::clone(&session), reader));
        if let Ok(mut slot) = session.reader.lock() {
            *slot = Some(handle);
        }

        tracing::debug!(session = id, %peer, "Session started");
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_seen.load(Ordering::Acquire))
    }

    /// Why the session ended, once it has.
    pub fn end_state(&self) -> Option<SessionEnd> {
        self.end.get().cloned()
    }

    fn touch(&self) {
        self.last_seen
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    fn disconnected(&self) -> BridgeError {
        let reason = self
            .end
            .get()
            .map(SessionEnd::reason)
            .unwrap_or_else(|| "session closed".to_string());
        BridgeError::Disconnected(reason)
    }

    /// Write one request frame.
    ///
    /// Holds the write mutex for the whole frame. An I/O failure tears the
    /// session down; an unencodable request only fails this caller.
    pub async fn write(&self, request: PeerRequest) -> Result<(), BridgeError> {
        if !self.is_live() {
            return Err(self.disconnected());
        }

        let mut writer = self.writer.lock().await;
        if !self.is_live() {
            return Err(self.disconnected());
        }

        let request_id = request.id.clone();
        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(self.disconnected()),
            result = writer.send(request) => result,
        };

        match result {
            Ok(()) => {
                tracing::trace!(session = self.id, %request_id, "Request written");
                Ok(())
            }
            Err(e) if e.is_protocol() => Err(BridgeError::Protocol(e.to_string())),
            Err(e) => {
                tracing::warn!(session = self.id, error = %e, "Write to agent failed, closing session");
                self.abort(SessionEnd::Io(format!("write failed: {e}")));
                Err(self.disconnected())
            }
        }
    }

    /// Record why the session ended and stop the receive loop, which then
    /// fails every pending caller with that reason.
    fn abort(&self, end: SessionEnd) {
        self.live.store(false, Ordering::Release);
        let _ = self.end.set(end);
        self.shutdown.cancel();
    }

    /// Close the socket and wait for the receive loop to exit.
    ///
    /// Pending callers are failed with `reason`. Safe to call more than once.
    pub async fn close(&self, reason: &str) {
        self.live.store(false, Ordering::Release);
        let _ = self.end.set(SessionEnd::Closed(reason.to_string()));
        let failed = self
            .pending
            .fail_all(BridgeError::Disconnected(reason.to_string()));
        self.shutdown.cancel();

        let handle = self.reader.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(session = self.id, error = %e, "Receive loop panicked");
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.get_mut().shutdown().await {
            tracing::debug!(session = self.id, error = %e, "Socket shutdown failed");
        }

        tracing::info!(session = self.id, peer = %self.peer, failed, reason, "Session closed");
    }

    fn dispatch(&self, response: PeerResponse) {
        self.touch();
        match response.id.clone() {
            Some(id) => {
                self.pending.resolve(&id, Ok(response));
            }
            None => {
                tracing::debug!(session = self.id, "Ignoring agent message without a string id");
            }
        }
    }
}

async fn run_receive_loop(
    session: Arc<Session>,
    mut reader: FramedRead<OwnedReadHalf, JsonCodec<PeerResponse>>,
) {
    let end = loop {
        tokio::select! {
            biased;

            _ = session.shutdown.cancelled() => {
                break SessionEnd::Closed("session closed".to_string());
            }

            frame = reader.next() => match frame {
                Some(Ok(response)) => session.dispatch(response),
                Some(Err(e)) if e.is_protocol() => {
                    tracing::error!(session = session.id, error = %e, "Agent sent an invalid frame");
                    break SessionEnd::Protocol(e.to_string());
                }
                Some(Err(e)) => {
                    tracing::warn!(session = session.id, error = %e, "Agent connection error");
                    break SessionEnd::Io(e.to_string());
                }
                None => {
                    tracing::info!(session = session.id, peer = %session.peer, "Agent disconnected");
                    break SessionEnd::PeerHangup;
                }
            },
        }
    };

    session.live.store(false, Ordering::Release);
    // A close() that raced us already recorded its own reason.
    let _ = session.end.set(end);
    let failed = session.pending.fail_all(session.disconnected());
    if failed > 0 {
        tracing::warn!(session = session.id, failed, "Failed pending requests on session end");
    }
    tracing::debug!(session = session.id, "Receive loop exiting");
}
