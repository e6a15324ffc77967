//! Handler capability and the inbound decode/dispatch driver.

use crate::path::PathId;
use crate::protocol::error::{HandlerError, RoutingError};
use crate::protocol::{DataDiscard, MessageKind, PathConfirm, PathLatency, RoutingMessage};

/// Dispatch target for decoded routing messages.
///
/// Implemented by whatever owns path state. One method per message
/// variant; each receives the decoded message and the path it arrived on.
/// Methods take `&self` so one handler can serve many paths from many
/// threads, and must not keep a reference to the message after returning.
pub trait MessageHandler {
    /// Offer a decoded message for verbatim relay before dispatch.
    ///
    /// `raw` is the exact buffer `msg` was decoded from. Returning
    /// `Ok(true)` means the handler forwarded it and no handler method is
    /// called. Hops that are not the message's consumer relay `raw` rather
    /// than re-encoding `msg`, which would drop fields unknown to them.
    fn relay(&self, msg: &RoutingMessage, raw: &[u8], from: &PathId) -> Result<bool, HandlerError> {
        let _ = (msg, raw, from);
        Ok(false)
    }

    fn handle_path_latency(&self, msg: &PathLatency, from: &PathId) -> Result<(), HandlerError>;

    fn handle_path_confirm(&self, msg: &PathConfirm, from: &PathId) -> Result<(), HandlerError>;

    fn handle_data_discard(&self, msg: &DataDiscard, from: &PathId) -> Result<(), HandlerError>;
}

/// Decode one decrypted buffer received on `from` and dispatch it.
///
/// Returns the kind of message that was handled or relayed. Decode
/// failures never reach the handler.
pub fn process_inbound(
    handler: &dyn MessageHandler,
    from: &PathId,
    buf: &[u8],
) -> Result<MessageKind, RoutingError> {
    let msg = RoutingMessage::decode(buf)?;
    if !handler.relay(&msg, buf, from)? {
        msg.handle(from, handler)?;
    }
    Ok(msg.kind())
}
