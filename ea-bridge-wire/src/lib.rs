//! Wire protocol for the EA command bridge.
//!
//! The bridge and the trading agent exchange JSON envelopes over one
//! persistent TCP stream.
//!
//! # Architecture
//!
//! - **protocol**: Envelope types (PeerRequest, PeerResponse) and RequestId
//! - **codec**: Length-prefixed JSON framing for AsyncRead/AsyncWrite
//! - **error**: Framing failures

pub mod codec;
pub mod error;
pub mod protocol;

pub use codec::{HEADER_LEN, JsonCodec, MAX_FRAME_LEN};
pub use error::FrameError;
pub use protocol::{Params, PeerRequest, PeerResponse, RequestId};
