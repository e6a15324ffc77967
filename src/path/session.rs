//! Path session: per-path state and the routing message handler.
//!
//! `PathSession` owns every path this node participates in and implements
//! [`MessageHandler`]. Each path's state sits behind its own mutex so
//! handlers for different paths never contend; the path table lock is only
//! held long enough to look up or clone an entry. Replies go to the
//! transport through `try_send` and are never awaited.
//!
//! On transit paths every message is relayed as the exact bytes it arrived
//! in (see [`MessageHandler::relay`]), so fields this node does not know
//! survive the hop.

use super::{
    Direction, InboundFrame, InboundRx, LatencySample, LatencyTracker, OutboundMessage,
    OutboundTx, PathId, PathRole,
};
use crate::config::LatencyConfig;
use crate::protocol::{
    process_inbound, DataDiscard, HandlerError, MessageHandler, MessageKind, PathConfirm,
    PathLatency, RoutingError, RoutingMessage,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Cap on the probe interval backoff exponent for unresponsive paths.
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Floor for the maintenance tick period.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Errors from locally initiated path operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown path {0}")]
    UnknownPath(PathId),

    #[error("path {path} is {role}, only originators send probes")]
    NotOriginator { path: PathId, role: PathRole },

    #[error("path {path} already has {count} outstanding probes")]
    TooManyOutstanding { path: PathId, count: usize },
}

/// What one maintenance tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Probes forgotten after timing out.
    pub expired: usize,
    /// Probes originated (resends and periodic).
    pub probes_sent: usize,
}

struct PathState {
    role: PathRole,
    latency: LatencyTracker,
    /// Locally measured hop latency reported when echoing probes.
    hop_latency_ms: Option<u64>,
    /// Lifetime from the build confirmation, once received.
    lifetime_ms: Option<u64>,
    discards: u64,
}

impl PathState {
    fn new(role: PathRole) -> Self {
        Self {
            role,
            latency: LatencyTracker::new(),
            hop_latency_ms: None,
            lifetime_ms: None,
            discards: 0,
        }
    }
}

/// Owner of all path state on this node.
pub struct PathSession {
    config: LatencyConfig,
    paths: RwLock<HashMap<PathId, Arc<Mutex<PathState>>>>,
    outbound: OutboundTx,
}

impl PathSession {
    pub fn new(config: LatencyConfig, outbound: OutboundTx) -> Self {
        Self {
            config,
            paths: RwLock::new(HashMap::new()),
            outbound,
        }
    }

    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }

    // === Path table ===

    /// Start tracking a path. Returns false if it was already known.
    pub fn add_path(&self, id: PathId, role: PathRole) -> bool {
        let mut paths = self.paths.write();
        if paths.contains_key(&id) {
            return false;
        }
        paths.insert(id, Arc::new(Mutex::new(PathState::new(role))));
        debug!(path = %id, role = %role, "Path added");
        true
    }

    /// Stop tracking a path, dropping any outstanding probes.
    pub fn remove_path(&self, id: &PathId) -> bool {
        let Some(state) = self.paths.write().remove(id) else {
            return false;
        };
        let state = state.lock();
        info!(
            path = %id,
            role = %state.role,
            completed = state.latency.completed_count(),
            expired = state.latency.expired_count(),
            outstanding = state.latency.outstanding_count(),
            discards = state.discards,
            "Path removed"
        );
        true
    }

    pub fn path_count(&self) -> usize {
        self.paths.read().len()
    }

    fn get(&self, id: &PathId) -> Option<Arc<Mutex<PathState>>> {
        self.paths.read().get(id).cloned()
    }

    fn with_path<T>(&self, id: &PathId, f: impl FnOnce(&PathState) -> T) -> Option<T> {
        let state = self.get(id)?;
        let guard = state.lock();
        Some(f(&guard))
    }

    pub fn role(&self, id: &PathId) -> Option<PathRole> {
        self.with_path(id, |s| s.role)
    }

    /// Set the latency this node reports when echoing probes on `id`.
    pub fn record_hop_latency(&self, id: &PathId, latency_ms: u64) -> Result<(), SessionError> {
        let state = self.get(id).ok_or(SessionError::UnknownPath(*id))?;
        state.lock().hop_latency_ms = Some(latency_ms);
        Ok(())
    }

    // === Probe origination ===

    /// Originate a latency probe on `id` and hand it to the transport.
    ///
    /// Returns the correlation token.
    pub fn send_probe(&self, id: &PathId, now: Instant) -> Result<u64, SessionError> {
        let state = self.get(id).ok_or(SessionError::UnknownPath(*id))?;
        let token = {
            let mut state = state.lock();
            self.register_probe(id, &mut state, now)?
        };
        self.submit(*id, Direction::Forward, PathLatency::probe(token).into());
        debug!(path = %id, token = token, "Sent latency probe");
        Ok(token)
    }

    fn register_probe(
        &self,
        id: &PathId,
        state: &mut PathState,
        now: Instant,
    ) -> Result<u64, SessionError> {
        if state.role != PathRole::Originator {
            return Err(SessionError::NotOriginator {
                path: *id,
                role: state.role,
            });
        }
        let count = state.latency.outstanding_count();
        if count >= self.config.max_outstanding() {
            return Err(SessionError::TooManyOutstanding { path: *id, count });
        }
        let token = state.latency.next_token(&mut rand::thread_rng());
        state.latency.register(token, now);
        Ok(token)
    }

    /// Probe interval after `consecutive_timeouts` timed-out rounds.
    ///
    /// Backs off exponentially once the resend budget is spent.
    fn probe_interval(&self, consecutive_timeouts: u32) -> Duration {
        let excess = consecutive_timeouts
            .saturating_sub(self.config.max_resends())
            .min(MAX_BACKOFF_SHIFT);
        Duration::from_millis(self.config.probe_interval_ms().saturating_mul(1u64 << excess))
    }

    /// Expire timed-out probes and originate due ones.
    ///
    /// A timeout triggers an immediate resend while the consecutive timeout
    /// count is within `max_resends`; otherwise idle originator paths are
    /// probed every `probe_interval_ms`, backing off on unresponsive paths.
    pub fn tick(&self, now: Instant) -> TickSummary {
        let timeout = Duration::from_millis(self.config.probe_timeout_ms());
        let max_resends = self.config.max_resends();
        let mut summary = TickSummary::default();

        let snapshot: Vec<(PathId, Arc<Mutex<PathState>>)> = self
            .paths
            .read()
            .iter()
            .map(|(id, state)| (*id, Arc::clone(state)))
            .collect();

        for (id, state) in snapshot {
            let token = {
                let mut state = state.lock();
                if state.role != PathRole::Originator {
                    continue;
                }

                let expired = state.latency.expire(now, timeout);
                let consecutive = state.latency.consecutive_timeouts();
                if !expired.is_empty() {
                    summary.expired += expired.len();
                    debug!(
                        path = %id,
                        tokens = ?expired,
                        consecutive = consecutive,
                        "Latency probes timed out"
                    );
                    if consecutive == max_resends.saturating_add(1) {
                        warn!(path = %id, "Path unresponsive to latency probes, backing off");
                    }
                }

                let resend_due = !expired.is_empty() && consecutive <= max_resends;
                let interval_due = state
                    .latency
                    .since_last_probe(now)
                    .map_or(true, |elapsed| elapsed >= self.probe_interval(consecutive));
                if !(resend_due || interval_due) {
                    continue;
                }

                match self.register_probe(&id, &mut state, now) {
                    Ok(token) => token,
                    Err(e) => {
                        trace!(path = %id, error = %e, "Skipping probe");
                        continue;
                    }
                }
            };

            self.submit(id, Direction::Forward, PathLatency::probe(token).into());
            summary.probes_sent += 1;
            debug!(path = %id, token = token, "Sent latency probe");
        }

        summary
    }

    // === Inbound ===

    /// Decode and dispatch one inbound frame, logging any failure.
    pub fn process_frame(&self, frame: &InboundFrame) -> Result<MessageKind, RoutingError> {
        let result = process_inbound(self, &frame.path, &frame.data);
        match &result {
            Ok(kind) => trace!(path = %frame.path, kind = %kind, "Handled control message"),
            Err(RoutingError::Decode(e)) => {
                debug!(path = %frame.path, error = %e, len = frame.data.len(), "Dropping malformed control message")
            }
            Err(RoutingError::HandlerRejected(e)) => {
                debug!(path = %frame.path, error = %e, "Control message rejected")
            }
        }
        result
    }

    /// Run the inbound event loop.
    ///
    /// Processes frames from the transport and runs a periodic maintenance
    /// tick. Returns when the inbound channel is closed. A zero
    /// `tick_interval` is raised to one millisecond.
    pub async fn run(self: Arc<Self>, mut inbound: InboundRx, tick_interval: Duration) {
        let mut tick = tokio::time::interval(tick_interval.max(MIN_TICK_INTERVAL));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(frame) => {
                        let _ = self.process_frame(&frame);
                    }
                    None => {
                        debug!("Inbound channel closed, stopping path session");
                        break;
                    }
                },
                _ = tick.tick() => {
                    let summary = self.tick(Instant::now());
                    if summary != TickSummary::default() {
                        trace!(
                            expired = summary.expired,
                            probes_sent = summary.probes_sent,
                            "Path maintenance tick"
                        );
                    }
                }
            }
        }
    }

    /// Latency handling with an explicit clock.
    ///
    /// - `L == 0` at an endpoint: echo with our latency, token untouched;
    /// - `L != 0` at an endpoint: complete the matching outstanding probe.
    ///
    /// Transit paths only relay raw frames and reject decoded messages.
    pub fn handle_latency_at(
        &self,
        msg: &PathLatency,
        from: &PathId,
        now: Instant,
    ) -> Result<(), HandlerError> {
        let state = self.get(from).ok_or(HandlerError::UnknownPath(*from))?;
        let mut state = state.lock();
        let role = state.role;

        if role == PathRole::Transit {
            return Err(relay_only(MessageKind::PathLatency, from));
        }

        if !msg.is_reply() {
            let latency_ms = state
                .hop_latency_ms
                .unwrap_or(self.config.echo_latency_ms())
                .max(1);
            drop(state);
            debug!(path = %from, token = msg.token, latency_ms = latency_ms, "Echoing latency probe");
            self.submit(*from, role.reply_direction(), msg.reply(latency_ms).into());
            return Ok(());
        }

        match state.latency.complete(msg.token, msg.latency_ms, now) {
            Some(sample) => {
                debug!(
                    path = %from,
                    token = sample.token,
                    rtt_ms = sample.rtt.as_millis() as u64,
                    reported_ms = sample.reported_ms,
                    srtt_ms = state.latency.srtt().map(|d| d.as_millis() as u64),
                    "Latency probe completed"
                );
                Ok(())
            }
            None => Err(HandlerError::StaleToken {
                path: *from,
                token: msg.token,
            }),
        }
    }

    fn submit(&self, path: PathId, direction: Direction, msg: RoutingMessage) -> bool {
        self.submit_payload(path, direction, msg.kind(), msg.encode())
    }

    fn submit_payload(
        &self,
        path: PathId,
        direction: Direction,
        kind: MessageKind,
        payload: Vec<u8>,
    ) -> bool {
        let out = OutboundMessage {
            path,
            direction,
            payload,
        };
        match self.outbound.try_send(out) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(path = %path, kind = %kind, "Outbound channel full, dropping control message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(path = %path, kind = %kind, "Outbound channel closed, dropping control message");
                false
            }
        }
    }

    // === Accessors ===

    pub fn outstanding_probes(&self, id: &PathId) -> Option<usize> {
        self.with_path(id, |s| s.latency.outstanding_count())
    }

    pub fn is_outstanding(&self, id: &PathId, token: u64) -> bool {
        self.with_path(id, |s| s.latency.is_outstanding(token))
            .unwrap_or(false)
    }

    pub fn srtt(&self, id: &PathId) -> Option<Duration> {
        self.with_path(id, |s| s.latency.srtt()).flatten()
    }

    pub fn last_sample(&self, id: &PathId) -> Option<LatencySample> {
        self.with_path(id, |s| s.latency.last_sample()).flatten()
    }

    /// Probes completed on `id` since it was added.
    pub fn completed_probes(&self, id: &PathId) -> Option<u64> {
        self.with_path(id, |s| s.latency.completed_count())
    }

    pub fn consecutive_timeouts(&self, id: &PathId) -> Option<u32> {
        self.with_path(id, |s| s.latency.consecutive_timeouts())
    }

    /// Lifetime from the path's build confirmation, if confirmed.
    pub fn confirmed_lifetime(&self, id: &PathId) -> Option<Duration> {
        self.with_path(id, |s| s.lifetime_ms.map(Duration::from_millis))
            .flatten()
    }

    pub fn discard_count(&self, id: &PathId) -> Option<u64> {
        self.with_path(id, |s| s.discards)
    }
}

/// Transit hops never act on decoded content.
fn relay_only(kind: MessageKind, path: &PathId) -> HandlerError {
    HandlerError::Rejected(format!("{kind} on transit path {path} is relayed, not handled"))
}

/// Direction a transit hop relays a message in.
///
/// Unanswered latency probes continue toward the terminus; everything else
/// travels back toward the originator.
fn relay_direction(msg: &RoutingMessage) -> Direction {
    match msg {
        RoutingMessage::PathLatency(m) if !m.is_reply() => Direction::Forward,
        _ => Direction::Reverse,
    }
}

impl MessageHandler for PathSession {
    fn relay(&self, msg: &RoutingMessage, raw: &[u8], from: &PathId) -> Result<bool, HandlerError> {
        let state = self.get(from).ok_or(HandlerError::UnknownPath(*from))?;
        if state.lock().role != PathRole::Transit {
            return Ok(false);
        }
        let direction = relay_direction(msg);
        trace!(path = %from, kind = %msg.kind(), direction = %direction, "Relaying control message");
        self.submit_payload(*from, direction, msg.kind(), raw.to_vec());
        Ok(true)
    }

    fn handle_path_latency(&self, msg: &PathLatency, from: &PathId) -> Result<(), HandlerError> {
        self.handle_latency_at(msg, from, Instant::now())
    }

    /// Only the originator consumes build confirmations.
    fn handle_path_confirm(&self, msg: &PathConfirm, from: &PathId) -> Result<(), HandlerError> {
        let state = self.get(from).ok_or(HandlerError::UnknownPath(*from))?;
        let mut state = state.lock();
        match state.role {
            PathRole::Originator => {
                state.lifetime_ms = Some(msg.lifetime_ms);
                info!(
                    path = %from,
                    lifetime_ms = msg.lifetime_ms,
                    seq = msg.sequence,
                    "Path confirmed"
                );
                Ok(())
            }
            PathRole::Transit => Err(relay_only(MessageKind::PathConfirm, from)),
            PathRole::Terminus => Err(HandlerError::Rejected(
                "path confirm received at terminus".into(),
            )),
        }
    }

    fn handle_data_discard(&self, msg: &DataDiscard, from: &PathId) -> Result<(), HandlerError> {
        if msg.path_id != *from {
            return Err(HandlerError::Rejected(format!(
                "discard notice for path {} arrived on {}",
                msg.path_id, from
            )));
        }
        let state = self.get(from).ok_or(HandlerError::UnknownPath(*from))?;
        let mut state = state.lock();
        if state.role == PathRole::Transit {
            return Err(relay_only(MessageKind::DataDiscard, from));
        }
        state.discards += 1;
        debug!(
            path = %from,
            seq = msg.sequence,
            total = state.discards,
            "Transit hop discarded data"
        );
        Ok(())
    }
}
