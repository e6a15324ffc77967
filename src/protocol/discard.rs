//! Transit drop notice: DataDiscard.

use crate::bencode::{Encoder, Reader};
use crate::path::{PathId, PATH_ID_SIZE};
use crate::protocol::error::{HandlerError, ProtocolError};
use crate::protocol::message::{
    take_bytes_field, take_u64_field, MessageBody, MessageKind, RoutingMessage,
};
use crate::protocol::MessageHandler;

/// A transit hop dropped a message it could not forward on a path.
///
/// Wire keys: `P` = path_id (16 bytes), `S` = sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataDiscard {
    /// Path the dropped message belonged to.
    pub path_id: PathId,
    /// Sequence number of the dropped message.
    pub sequence: u64,
}

impl DataDiscard {
    pub fn new(path_id: PathId, sequence: u64) -> Self {
        Self { path_id, sequence }
    }
}

impl MessageBody for DataDiscard {
    const KIND: MessageKind = MessageKind::DataDiscard;

    fn encode_fields(&self, enc: &mut Encoder) {
        enc.dict_bytes(b"P", self.path_id.as_bytes());
        enc.dict_u64(b"S", self.sequence);
    }

    fn decode_key(&mut self, key: &[u8], r: &mut Reader<'_>) -> Result<bool, ProtocolError> {
        match key {
            b"P" => {
                let bytes = take_bytes_field(r, key)?;
                self.path_id = PathId::from_slice(bytes).map_err(|e| {
                    ProtocolError::Malformed(format!("field \"P\": {e}"))
                })?;
            }
            b"S" => self.sequence = take_u64_field(r, key)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn dispatch(&self, from: &PathId, handler: &dyn MessageHandler) -> Result<(), HandlerError> {
        handler.handle_data_discard(self, from)
    }

    fn into_message(self) -> RoutingMessage {
        RoutingMessage::DataDiscard(self)
    }
}
