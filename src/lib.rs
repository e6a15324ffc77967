//! pathctl: routing control messages for onion-routed paths.
//!
//! Canonical bencode codec, the closed set of path control messages
//! (latency probe, path confirm, data discard), dispatch to a message
//! handler, and a reference path session that correlates latency probes.

pub mod bencode;
pub mod config;
pub mod path;
pub mod protocol;

// Re-export codec types
pub use bencode::{DecodeError, Encoder, Reader, Value, ValueKind, MAX_DEPTH};

// Re-export config types
pub use config::{BuffersConfig, Config, ConfigError, LatencyConfig, NodeConfig};

// Re-export path types
pub use path::{
    inbound_channel, outbound_channel, Direction, InboundFrame, InboundRx, InboundTx,
    LatencySample, LatencyTracker, OutboundMessage, OutboundRx, OutboundTx, PathId, PathRole,
    PathSession, SessionError, TickSummary,
};

// Re-export protocol types
pub use protocol::{
    process_inbound, DataDiscard, HandlerError, MessageBody, MessageHandler, MessageKind,
    PathConfirm, PathLatency, ProtocolError, RoutingError, RoutingMessage, PROTOCOL_VERSION,
};
