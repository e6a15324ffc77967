//! Protocol error types.

use crate::bencode::{DecodeError, ValueKind};
use crate::path::PathId;
use thiserror::Error;

/// Errors related to decoding routing control messages.
///
/// All of these are fatal to the single message being decoded and to
/// nothing else; the caller drops the message and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("type mismatch for key {key:?}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("unknown message discriminant: {0:?}")]
    UnknownDiscriminant(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u64),
}

impl ProtocolError {
    /// Attach a field key to a decoder error raised while reading that
    /// field's value.
    pub fn field(key: &[u8], err: DecodeError) -> Self {
        let key = String::from_utf8_lossy(key).into_owned();
        match err {
            DecodeError::TypeMismatch { expected, found, .. } => ProtocolError::TypeMismatch {
                key,
                expected,
                found,
            },
            other => ProtocolError::Malformed(format!("field {key:?}: {other}")),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_))
    }
}

/// Structural errors outside any particular field are malformed input.
impl From<DecodeError> for ProtocolError {
    fn from(err: DecodeError) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

/// A well-formed message that the handler could not act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("unknown path {0}")]
    UnknownPath(PathId),

    #[error("stale correlation token {token} on path {path}")]
    StaleToken { path: PathId, token: u64 },

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Outcome of feeding one inbound buffer through decode and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    #[error("handler rejected message: {0}")]
    HandlerRejected(#[from] HandlerError),
}
