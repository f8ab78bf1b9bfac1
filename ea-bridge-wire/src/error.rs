use std::io;

use thiserror::Error;

/// Failure while reading or writing a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Declared or encoded body length is above the frame limit.
    ///
    /// On the read side the stream is no longer framing-aligned and the
    /// connection must be dropped.
    #[error("frame of {len} bytes exceeds maximum of {max} bytes")]
    Oversized { len: usize, max: usize },

    #[error("malformed frame body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FrameError {
    /// True when the peer violated the framing protocol, as opposed to the
    /// transport failing underneath it.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Oversized { .. } | Self::Malformed(_))
    }
}
