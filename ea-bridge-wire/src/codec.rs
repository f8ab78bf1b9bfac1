//! Framed codec for the agent connection.
//!
//! Uses LengthDelimitedCodec for framing + serde_json for serialization.
//! Frame layout: `[u32 big-endian body length][UTF-8 JSON body]`.

use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::error::FrameError;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest body either side will accept.
pub const MAX_FRAME_LEN: usize = 1_000_000;

/// Codec that frames messages with length prefix and serializes with JSON.
///
/// Wraps LengthDelimitedCodec and adds serde_json serialization plus an
/// up-front check of the declared length, so an oversized header is rejected
/// before any of its body is consumed.
pub struct JsonCodec<T> {
    inner: LengthDelimitedCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(HEADER_LEN)
                .max_frame_length(MAX_FRAME_LEN)
                .big_endian()
                .new_codec(),
            _phantom: PhantomData,
        }
    }
}

fn declared_len(src: &BytesMut) -> Option<usize> {
    let header: [u8; HEADER_LEN] = src.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(header) as usize)
}

impl<T: DeserializeOwned> Decoder for JsonCodec<T> {
    type Item = T;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(len) = declared_len(src)
            && len > MAX_FRAME_LEN
        {
            return Err(FrameError::Oversized {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        match self.inner.decode(src)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec<T> {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        let json_len = json.len();
        tracing::trace!(json_size_bytes = json_len, "Encoding frame");
        if json_len > MAX_FRAME_LEN {
            return Err(FrameError::Oversized {
                len: json_len,
                max: MAX_FRAME_LEN,
            });
        }
        if json_len > 100_000 {
            tracing::info!(
                json_size_bytes = json_len,
                json_size_kb = json_len / 1024,
                "Large frame being encoded"
            );
        }
        self.inner.encode(Bytes::from(json), dst)?;
        Ok(())
    }
}
