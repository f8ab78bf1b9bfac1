//! Agent bridge: TCP listener, per-connection sessions and request correlation.
//!
//! One agent connection is active at a time. A newer connection replaces the
//! older one, and every request still waiting on the old connection fails.

pub mod error;
pub mod facade;
pub mod pending;
pub mod session;

pub use error::BridgeError;
pub use facade::{Bridge, BridgeConfig, CommandSender};
pub use pending::{PendingRequests, PendingSlot};
pub use session::{Session, SessionEnd};
