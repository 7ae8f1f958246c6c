//! Length-prefixed JSON framing.
//!
//! Every frame is `LEN || BODY`, where `LEN` is the body size as a `u32`
//! little-endian and `BODY` is UTF-8 JSON. The decoder works on a captured
//! buffer: it stops quietly on an incomplete trailing frame and stops with a
//! [`DecodeTruncation`] on the first frame whose body cannot be parsed, since
//! frame boundaries past a corrupt frame cannot be trusted.

use super::command::Command;
use super::response::Response;
use crate::error::{CodecError, CodecResult};
use serde::Serialize;
use tracing::{debug, warn};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Encode one command as a frame.
pub fn encode(command: &Command) -> CodecResult<Vec<u8>> {
    encode_message(command)
}

/// Encode any serialisable message as a frame.
pub fn encode_message<T: Serialize + ?Sized>(message: &T) -> CodecResult<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge { len: body.len() })?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Encode commands back to back, preserving order.
pub fn encode_all(commands: &[Command]) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    for command in commands {
        buf.extend_from_slice(&encode(command)?);
    }
    Ok(buf)
}

/// Why decoding stopped before the end of the buffer on a complete frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum TruncationReason {
    InvalidUtf8(String),
    InvalidJson(String),
    NotAnObject,
}

/// A malformed frame that ended decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeTruncation {
    /// Offset of the malformed frame's length prefix.
    pub offset: usize,
    pub reason: TruncationReason,
}

/// Output of [`decode`].
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// Responses in stream order.
    pub responses: Vec<Response>,

    /// Offset of the first byte not consumed by a complete, valid frame.
    pub cursor: usize,

    /// Set when a length-correct frame held an undecodable body.
    pub truncation: Option<DecodeTruncation>,
}

impl Decoded {
    /// Bytes left after the cursor (partial trailer or data past a bad frame).
    pub fn trailing_bytes(&self, buffer_len: usize) -> usize {
        buffer_len.saturating_sub(self.cursor)
    }
}

/// Decode as many complete frames as `buffer` holds.
///
/// Never fails: incomplete trailing data is left unconsumed, and a malformed
/// frame ends the loop with everything decoded before it.
pub fn decode(buffer: &[u8]) -> Decoded {
    let mut decoded = Decoded::default();
    let mut cursor = 0usize;

    loop {
        let remaining = &buffer[cursor..];
        if remaining.len() < LENGTH_PREFIX_LEN {
            break;
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&remaining[..LENGTH_PREFIX_LEN]);
        let len = u32::from_le_bytes(prefix) as usize;

        let body_start = LENGTH_PREFIX_LEN;
        if remaining.len() - body_start < len {
            debug!(offset = cursor, expected = len, "incomplete trailing frame");
            break;
        }
        let body = &remaining[body_start..body_start + len];

        match parse_body(body) {
            Ok(response) => {
                decoded.responses.push(response);
                cursor += body_start + len;
            }
            Err(reason) => {
                warn!(offset = cursor, reason = ?reason, "malformed frame, stopping decode");
                decoded.truncation = Some(DecodeTruncation {
                    offset: cursor,
                    reason,
                });
                break;
            }
        }
    }

    decoded.cursor = cursor;
    decoded
}

fn parse_body(body: &[u8]) -> Result<Response, TruncationReason> {
    let text =
        std::str::from_utf8(body).map_err(|e| TruncationReason::InvalidUtf8(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| TruncationReason::InvalidJson(e.to_string()))?;
    Response::from_value(value).ok_or(TruncationReason::NotAnObject)
}
