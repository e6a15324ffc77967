//! Path build confirmation: PathConfirm.

use crate::bencode::{Encoder, Reader};
use crate::path::PathId;
use crate::protocol::error::{HandlerError, ProtocolError};
use crate::protocol::message::{take_u64_field, MessageBody, MessageKind, RoutingMessage};
use crate::protocol::MessageHandler;

/// Sent by the terminal hop back to the originator once a path is built.
///
/// Wire keys: `L` = lifetime_ms, `S` = sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathConfirm {
    /// How long the path stays valid, in milliseconds.
    pub lifetime_ms: u64,
    /// Sender's routing message sequence number.
    pub sequence: u64,
}

impl PathConfirm {
    pub fn new(lifetime_ms: u64, sequence: u64) -> Self {
        Self {
            lifetime_ms,
            sequence,
        }
    }
}

impl MessageBody for PathConfirm {
    const KIND: MessageKind = MessageKind::PathConfirm;

    fn encode_fields(&self, enc: &mut Encoder) {
        enc.dict_u64(b"L", self.lifetime_ms);
        enc.dict_u64(b"S", self.sequence);
    }

    fn decode_key(&mut self, key: &[u8], r: &mut Reader<'_>) -> Result<bool, ProtocolError> {
        match key {
            b"L" => self.lifetime_ms = take_u64_field(r, key)?,
            b"S" => self.sequence = take_u64_field(r, key)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.lifetime_ms == 0 {
            return Err(ProtocolError::Malformed("path confirm with zero lifetime".into()));
        }
        Ok(())
    }

    fn dispatch(&self, from: &PathId, handler: &dyn MessageHandler) -> Result<(), HandlerError> {
        handler.handle_path_confirm(self, from)
    }

    fn into_message(self) -> RoutingMessage {
        RoutingMessage::PathConfirm(self)
    }
}
