//! Routing Control Messages
//!
//! Wire format and dispatch for the small control messages exchanged
//! inside an established path: latency probes, build confirmations and
//! transit drop notices. Each message is a canonical dictionary (see
//! [`crate::bencode`]) whose first key `A` names the variant:
//!
//! | Tag | Variant       | Fields                         |
//! |-----|---------------|--------------------------------|
//! | `D` | DataDiscard   | `P` path id, `S` sequence      |
//! | `L` | PathLatency   | `L` latency ms, `T` token      |
//! | `P` | PathConfirm   | `L` lifetime ms, `S` sequence  |
//!
//! Every variant also carries the protocol version under `V`.
//!
//! Messages reach this layer already decrypted; routing and addressing
//! belong to the transport.

mod confirm;
mod discard;
mod error;
mod handler;
mod latency;
mod message;

pub use confirm::PathConfirm;
pub use discard::DataDiscard;
pub use error::{HandlerError, ProtocolError, RoutingError};
pub use handler::{process_inbound, MessageHandler};
pub use latency::PathLatency;
pub use message::{MessageBody, MessageKind, RoutingMessage};

/// Protocol version written under the `V` key.
pub const PROTOCOL_VERSION: u64 = 0;

/// Reserved key holding the message discriminant.
pub const KEY_DISCRIMINANT: &[u8] = b"A";

/// Reserved key holding the protocol version.
pub const KEY_VERSION: &[u8] = b"V";
