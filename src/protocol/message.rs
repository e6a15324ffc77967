//! Message contract, discriminant table, and the closed message enum.

use crate::bencode::{Encoder, Reader};
use crate::path::PathId;
use crate::protocol::error::{HandlerError, ProtocolError};
use crate::protocol::{
    DataDiscard, MessageHandler, PathConfirm, PathLatency, KEY_DISCRIMINANT, KEY_VERSION,
    PROTOCOL_VERSION,
};
use std::fmt;
use tracing::trace;

/// Discriminant of every known routing control message.
///
/// The tag is the value written under the `A` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Path build confirmation.
    PathConfirm,
    /// Latency probe and its echo.
    PathLatency,
    /// Transit hop dropped traffic for a path.
    DataDiscard,
}

impl MessageKind {
    /// Look up a discriminant tag.
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"P" => Some(MessageKind::PathConfirm),
            b"L" => Some(MessageKind::PathLatency),
            b"D" => Some(MessageKind::DataDiscard),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static [u8] {
        match self {
            MessageKind::PathConfirm => b"P",
            MessageKind::PathLatency => b"L",
            MessageKind::DataDiscard => b"D",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::PathConfirm => "PathConfirm",
            MessageKind::PathLatency => "PathLatency",
            MessageKind::DataDiscard => "DataDiscard",
        };
        write!(f, "{}", name)
    }
}

/// Contract implemented by every concrete message variant.
///
/// Field keys must sort strictly between the discriminant key `A` and the
/// version key `V`, and `encode_fields` must write them in ascending order.
pub trait MessageBody: Default + Sized {
    const KIND: MessageKind;

    /// Write every semantic field as dictionary entries.
    fn encode_fields(&self, enc: &mut Encoder);

    /// Interpret the value under `key`.
    ///
    /// Returns `Ok(false)` without consuming anything if the key is not
    /// one of this variant's fields.
    fn decode_key(&mut self, key: &[u8], r: &mut Reader<'_>) -> Result<bool, ProtocolError>;

    /// Check cross-field constraints once every key has been read.
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Route this message to its handler method.
    fn dispatch(&self, from: &PathId, handler: &dyn MessageHandler) -> Result<(), HandlerError>;

    fn into_message(self) -> RoutingMessage;
}

/// A decoded routing control message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingMessage {
    PathConfirm(PathConfirm),
    PathLatency(PathLatency),
    DataDiscard(DataDiscard),
}

impl<B: MessageBody> From<B> for RoutingMessage {
    fn from(body: B) -> Self {
        body.into_message()
    }
}

impl RoutingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            RoutingMessage::PathConfirm(_) => MessageKind::PathConfirm,
            RoutingMessage::PathLatency(_) => MessageKind::PathLatency,
            RoutingMessage::DataDiscard(_) => MessageKind::DataDiscard,
        }
    }

    /// Encode as a canonical dictionary.
    ///
    /// Format: `d 1:A <tag> <fields...> 1:V i<version>e e`
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::with_capacity(64);
        enc.begin_dict();
        enc.dict_bytes(KEY_DISCRIMINANT, self.kind().tag());
        match self {
            RoutingMessage::PathConfirm(m) => m.encode_fields(&mut enc),
            RoutingMessage::PathLatency(m) => m.encode_fields(&mut enc),
            RoutingMessage::DataDiscard(m) => m.encode_fields(&mut enc),
        }
        enc.dict_u64(KEY_VERSION, PROTOCOL_VERSION);
        enc.end();
        enc.into_bytes()
    }

    /// Decode one message spanning the whole buffer.
    ///
    /// The discriminant must be the first key. Unknown field keys are
    /// skipped; an unknown discriminant is rejected before any field is
    /// read.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(buf);
        r.enter_dict()?;

        let first = r
            .next_key()?
            .ok_or_else(|| ProtocolError::Malformed("empty message dictionary".into()))?;
        if first != KEY_DISCRIMINANT {
            return Err(ProtocolError::Malformed(format!(
                "first key must be the discriminant, got {:?}",
                String::from_utf8_lossy(first)
            )));
        }
        let tag = r
            .take_bytes()
            .map_err(|e| ProtocolError::field(KEY_DISCRIMINANT, e))?;
        let kind = MessageKind::from_tag(tag).ok_or_else(|| {
            ProtocolError::UnknownDiscriminant(String::from_utf8_lossy(tag).into_owned())
        })?;

        let msg = match kind {
            MessageKind::PathConfirm => decode_body::<PathConfirm>(&mut r)?.into_message(),
            MessageKind::PathLatency => decode_body::<PathLatency>(&mut r)?.into_message(),
            MessageKind::DataDiscard => decode_body::<DataDiscard>(&mut r)?.into_message(),
        };
        r.finish()?;
        Ok(msg)
    }

    /// Dispatch to the matching handler method.
    pub fn handle(&self, from: &PathId, handler: &dyn MessageHandler) -> Result<(), HandlerError> {
        match self {
            RoutingMessage::PathConfirm(m) => m.dispatch(from, handler),
            RoutingMessage::PathLatency(m) => m.dispatch(from, handler),
            RoutingMessage::DataDiscard(m) => m.dispatch(from, handler),
        }
    }
}

impl fmt::Display for RoutingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMessage::PathConfirm(m) => write!(
                f,
                "PathConfirm(lifetime_ms={}, seq={})",
                m.lifetime_ms, m.sequence
            ),
            RoutingMessage::PathLatency(m) => write!(
                f,
                "PathLatency(token={}, latency_ms={})",
                m.token, m.latency_ms
            ),
            RoutingMessage::DataDiscard(m) => {
                write!(f, "DataDiscard(path={}, seq={})", m.path_id, m.sequence)
            }
        }
    }
}

/// Key-driven decode loop for the remainder of a message dictionary.
fn decode_body<B: MessageBody>(r: &mut Reader<'_>) -> Result<B, ProtocolError> {
    let mut body = B::default();
    let mut version = None;

    while let Some(key) = r.next_key()? {
        if key == KEY_DISCRIMINANT {
            return Err(ProtocolError::Malformed("repeated discriminant".into()));
        }
        if key == KEY_VERSION {
            version = Some(r.take_u64().map_err(|e| ProtocolError::field(key, e))?);
            continue;
        }
        if !body.decode_key(key, r)? {
            trace!(
                kind = %B::KIND,
                key = %String::from_utf8_lossy(key),
                "Skipping unknown field"
            );
            r.skip_value()?;
        }
    }

    if let Some(v) = version {
        if v != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(v));
        }
    }
    body.validate()?;
    Ok(body)
}

/// Read a `u64` field value, tagging errors with the key.
pub(crate) fn take_u64_field(r: &mut Reader<'_>, key: &[u8]) -> Result<u64, ProtocolError> {
    r.take_u64().map_err(|e| ProtocolError::field(key, e))
}

/// Read a byte-string field value, tagging errors with the key.
pub(crate) fn take_bytes_field<'a>(
    r: &mut Reader<'a>,
    key: &[u8],
) -> Result<&'a [u8], ProtocolError> {
    r.take_bytes().map_err(|e| ProtocolError::field(key, e))
}
