use std::time::Duration;

/// Failure of a bridge operation.
///
/// Cloneable so one terminal event (disconnect, shutdown) can be delivered to
/// every caller still waiting on the same session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// No live agent connection when the command was issued.
    #[error("agent not connected")]
    NotConnected,

    /// The agent did not answer before the deadline. The command may still
    /// execute on the agent side.
    #[error("command '{command}' timed out after {}s", .after.as_secs_f64())]
    Timeout { command: String, after: Duration },

    /// The connection carrying the request went away before it was answered.
    #[error("agent disconnected: {0}")]
    Disconnected(String),

    /// Malformed or oversized frame, or a bridge-side protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Application-level error reported by the agent, verbatim.
    #[error("{0}")]
    Remote(String),

    /// The timeout is too large to turn into a deadline.
    #[error("timeout of {}s is out of range", .0.as_secs_f64())]
    InvalidTimeout(Duration),

    #[error("bridge already started")]
    AlreadyStarted,

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl BridgeError {
    /// True for failures caused by the agent connection being unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Disconnected(_))
    }
}
