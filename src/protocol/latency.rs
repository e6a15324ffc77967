//! Latency probe: PathLatency.

use crate::bencode::{Encoder, Reader};
use crate::path::PathId;
use crate::protocol::error::{HandlerError, ProtocolError};
use crate::protocol::message::{take_u64_field, MessageBody, MessageKind, RoutingMessage};
use crate::protocol::MessageHandler;

/// Round-trip latency probe carried over an established path.
///
/// The same message travels in both directions. The originator sends it
/// with a fresh `token` and `latency_ms == 0`; the responder echoes the
/// token back with `latency_ms` filled in. No hop ever changes `token`.
///
/// Wire keys: `L` = latency_ms, `T` = token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathLatency {
    /// Opaque correlation token chosen by the originator.
    pub token: u64,
    /// Measured latency in milliseconds; zero while outbound.
    pub latency_ms: u64,
}

impl PathLatency {
    /// Create an outbound probe.
    pub fn probe(token: u64) -> Self {
        Self {
            token,
            latency_ms: 0,
        }
    }

    /// Build the echo of this probe carrying `latency_ms`.
    pub fn reply(&self, latency_ms: u64) -> Self {
        Self {
            token: self.token,
            latency_ms,
        }
    }

    /// True if a responder has filled in the latency.
    pub fn is_reply(&self) -> bool {
        self.latency_ms != 0
    }
}

impl MessageBody for PathLatency {
    const KIND: MessageKind = MessageKind::PathLatency;

    fn encode_fields(&self, enc: &mut Encoder) {
        enc.dict_u64(b"L", self.latency_ms);
        enc.dict_u64(b"T", self.token);
    }

    fn decode_key(&mut self, key: &[u8], r: &mut Reader<'_>) -> Result<bool, ProtocolError> {
        match key {
            b"L" => self.latency_ms = take_u64_field(r, key)?,
            b"T" => self.token = take_u64_field(r, key)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn dispatch(&self, from: &PathId, handler: &dyn MessageHandler) -> Result<(), HandlerError> {
        handler.handle_path_latency(self, from)
    }

    fn into_message(self) -> RoutingMessage {
        RoutingMessage::PathLatency(self)
    }
}
