//! Pending-request table: request id → write-once result slot.
//!
//! Callers register before writing, then wait on the slot. The session's
//! receive loop resolves slots as responses arrive. Every entry leaves the
//! table exactly once, through whichever of resolve / cancel / fail_all
//! reaches it first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use ea_bridge_wire::{PeerResponse, RequestId};
use tokio::sync::oneshot;

use super::error::BridgeError;

/// What a waiting caller eventually receives.
pub type Outcome = Result<PeerResponse, BridgeError>;

struct PendingEntry {
    created_at: Instant,
    deadline: Instant,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Default)]
struct TableState {
    entries: HashMap<RequestId, PendingEntry>,
    /// Set by fail_all; later registrations fail with this error.
    closed: Option<BridgeError>,
}

/// Correlation table for one session's in-flight requests.
#[derive(Default)]
pub struct PendingRequests {
    state: Mutex<TableState>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Pending table mutex poisoned - recovering");
            poisoned.into_inner()
        })
    }

    /// Insert a slot for `id`. The slot's deadline is `timeout` from now.
    pub fn register(
        self: &Arc<Self>,
        id: RequestId,
        timeout: Duration,
    ) -> Result<PendingSlot, BridgeError> {
        let mut state = self.lock();
        if let Some(ref err) = state.closed {
            return Err(err.clone());
        }
        if state.entries.contains_key(&id) {
            tracing::error!(request_id = %id, "Bug: duplicate request id registered");
            return Err(BridgeError::Protocol(format!("duplicate request id {id}")));
        }

        let created_at = Instant::now();
        let deadline = created_at
            .checked_add(timeout)
            .ok_or(BridgeError::InvalidTimeout(timeout))?;
        let (tx, rx) = oneshot::channel();
        state.entries.insert(
            id.clone(),
            PendingEntry {
                created_at,
                deadline,
                tx,
            },
        );

        Ok(PendingSlot {
            id,
            deadline,
            rx,
            table: Arc::downgrade(self),
            settled: false,
        })
    }

    /// Remove the entry for `id` and deliver `outcome` to its caller.
    ///
    /// Returns false when no entry exists, e.g. a response arriving after
    /// its caller timed out. That case is expected and only logged.
    pub fn resolve(&self, id: &RequestId, outcome: Outcome) -> bool {
        let Some(entry) = self.lock().entries.remove(id) else {
            tracing::debug!(request_id = %id, "Dropping response with no pending request");
            return false;
        };

        let now = Instant::now();
        tracing::debug!(
            request_id = %id,
            elapsed = ?now.duration_since(entry.created_at),
            "Request resolved"
        );
        if now > entry.deadline {
            tracing::debug!(request_id = %id, "Resolved after deadline");
        }

        if entry.tx.send(outcome).is_err() {
            tracing::debug!(request_id = %id, "Caller went away before its response arrived");
        }
        true
    }

    /// Drain every entry, resolving each with `error`, and refuse further
    /// registrations. Returns how many callers were failed.
    pub fn fail_all(&self, error: BridgeError) -> usize {
        let drained: Vec<_> = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(error.clone());
            }
            state.entries.drain().collect()
        };

        let count = drained.len();
        for (id, entry) in drained {
            tracing::debug!(request_id = %id, %error, "Failing pending request");
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    /// Remove the entry for `id` without resolving it.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.lock().entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }
}

/// Caller side of a pending request.
///
/// Dropping an unsettled slot removes its entry, so a caller whose future is
/// cancelled never leaves a stale id behind.
pub struct PendingSlot {
    id: RequestId,
    deadline: Instant,
    rx: oneshot::Receiver<Outcome>,
    table: Weak<PendingRequests>,
    settled: bool,
}

impl PendingSlot {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the slot to be written.
    pub async fn recv(&mut self) -> Outcome {
        let outcome = match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Disconnected(
                "request discarded without a result".to_string(),
            )),
        };
        self.settled = true;
        outcome
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if !self.settled
            && let Some(table) = self.table.upgrade()
        {
            table.cancel(&self.id);
        }
    }
}
