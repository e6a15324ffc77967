//! Path State and Transport Interface
//!
//! Per-path state owned by this node and the narrow interface to the
//! transport collaborator:
//!
//! - inbound: [`InboundFrame`]s (already-decrypted payloads tagged with
//!   the path they arrived on) through an [`InboundRx`] channel;
//! - outbound: [`OutboundMessage`]s (encoded payload plus direction)
//!   through an [`OutboundTx`] channel. The transport onion-encrypts and
//!   sends them; this crate never addresses or routes.

mod id;
mod latency;
mod session;

use std::fmt;

pub use id::{InvalidPathId, PathId, PATH_ID_SIZE};
pub use latency::{LatencySample, LatencyTracker};
pub use session::{PathSession, SessionError, TickSummary};

// ============================================================================
// Path Roles and Directions
// ============================================================================

/// This node's position on a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRole {
    /// We built the path and originate probes on it.
    Originator,
    /// We relay traffic between two other hops.
    Transit,
    /// We are the far end of the path.
    Terminus,
}

impl PathRole {
    /// Direction in which this role sends replies to a probe.
    pub fn reply_direction(self) -> Direction {
        match self {
            PathRole::Originator => Direction::Forward,
            PathRole::Transit | PathRole::Terminus => Direction::Reverse,
        }
    }
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathRole::Originator => "originator",
            PathRole::Transit => "transit",
            PathRole::Terminus => "terminus",
        };
        write!(f, "{}", name)
    }
}

/// Direction of travel along a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Away from the originator, toward the terminus.
    Forward,
    /// Back toward the originator.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

// ============================================================================
// Transport Channels
// ============================================================================

/// A decrypted control payload delivered by the transport.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    /// Path the payload arrived on.
    pub path: PathId,
    /// Plaintext of exactly one onion layer.
    pub data: Vec<u8>,
}

impl InboundFrame {
    pub fn new(path: PathId, data: Vec<u8>) -> Self {
        Self { path, data }
    }
}

/// An encoded control message handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub path: PathId,
    pub direction: Direction,
    pub payload: Vec<u8>,
}

/// Channel sender for inbound frames (held by the transport).
pub type InboundTx = tokio::sync::mpsc::Sender<InboundFrame>;

/// Channel receiver for inbound frames.
pub type InboundRx = tokio::sync::mpsc::Receiver<InboundFrame>;

/// Channel sender for outbound messages.
pub type OutboundTx = tokio::sync::mpsc::Sender<OutboundMessage>;

/// Channel receiver for outbound messages (held by the transport).
pub type OutboundRx = tokio::sync::mpsc::Receiver<OutboundMessage>;

/// Create an inbound frame channel with the given buffer size (at least 1).
pub fn inbound_channel(buffer: usize) -> (InboundTx, InboundRx) {
    tokio::sync::mpsc::channel(buffer.max(1))
}

/// Create an outbound message channel with the given buffer size (at least 1).
pub fn outbound_channel(buffer: usize) -> (OutboundTx, OutboundRx) {
    tokio::sync::mpsc::channel(buffer.max(1))
}
