//! Originator-side latency probe bookkeeping.
//!
//! Tracks the outstanding correlation tokens of one path together with the
//! instant each was sent, and folds completed round trips into a smoothed
//! RTT estimate (Jacobson/Karels, RFC 6298).

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// SRTT: α = 1/8 (RFC 6298).
const SRTT_ALPHA_SHIFT: u32 = 3;

/// RTTVAR: β = 1/4 (RFC 6298).
const RTTVAR_BETA_SHIFT: u32 = 2;

/// One completed probe round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencySample {
    pub token: u64,
    /// Locally measured round-trip time.
    pub rtt: Duration,
    /// Latency reported by the responder, in milliseconds.
    pub reported_ms: u64,
}

/// Outstanding probes and RTT statistics for a single path.
///
/// Not synchronized; the owner serializes access (see `PathSession`).
#[derive(Debug, Default)]
pub struct LatencyTracker {
    outstanding: HashMap<u64, Instant>,
    srtt_us: Option<i64>,
    rttvar_us: i64,
    last_sample: Option<LatencySample>,
    last_probe_at: Option<Instant>,
    consecutive_timeouts: u32,
    completed: u64,
    expired: u64,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a fresh nonzero token that is not currently outstanding.
    pub fn next_token<R: Rng>(&self, rng: &mut R) -> u64 {
        loop {
            let token: u64 = rng.gen();
            if token != 0 && !self.outstanding.contains_key(&token) {
                return token;
            }
        }
    }

    /// Record that a probe carrying `token` was sent at `now`.
    ///
    /// Returns false (and records nothing) for zero or duplicate tokens.
    pub fn register(&mut self, token: u64, now: Instant) -> bool {
        if token == 0 || self.outstanding.contains_key(&token) {
            return false;
        }
        self.outstanding.insert(token, now);
        self.last_probe_at = Some(now);
        true
    }

    /// Match a reply against an outstanding probe.
    ///
    /// Returns `None` if `token` is not outstanding (stale, duplicate or
    /// spoofed reply). On success the token is removed.
    pub fn complete(&mut self, token: u64, reported_ms: u64, now: Instant) -> Option<LatencySample> {
        let sent_at = self.outstanding.remove(&token)?;
        let rtt = now.saturating_duration_since(sent_at);
        self.update_srtt(rtt);

        let sample = LatencySample {
            token,
            rtt,
            reported_ms,
        };
        self.last_sample = Some(sample);
        self.consecutive_timeouts = 0;
        self.completed += 1;
        Some(sample)
    }

    /// Forget every probe sent more than `timeout` before `now`.
    ///
    /// Returns the expired tokens in ascending order.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<u64> {
        let mut expired: Vec<u64> = self
            .outstanding
            .iter()
            .filter(|(_, sent_at)| now.saturating_duration_since(**sent_at) >= timeout)
            .map(|(token, _)| *token)
            .collect();
        expired.sort_unstable();

        for token in &expired {
            self.outstanding.remove(token);
        }
        if !expired.is_empty() {
            self.consecutive_timeouts = self.consecutive_timeouts.saturating_add(1);
            self.expired += expired.len() as u64;
        }
        expired
    }

    fn update_srtt(&mut self, rtt: Duration) {
        let rtt_us = rtt.as_micros().min(i64::MAX as u128) as i64;
        match self.srtt_us {
            None => {
                self.srtt_us = Some(rtt_us);
                self.rttvar_us = rtt_us / 2;
            }
            Some(srtt) => {
                let err = (srtt - rtt_us).abs();
                self.rttvar_us += (err - self.rttvar_us) >> RTTVAR_BETA_SHIFT;
                self.srtt_us = Some(srtt + ((rtt_us - srtt) >> SRTT_ALPHA_SHIFT));
            }
        }
    }

    // --- Accessors ---

    pub fn is_outstanding(&self, token: u64) -> bool {
        self.outstanding.contains_key(&token)
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.srtt_us.map(|us| Duration::from_micros(us.max(0) as u64))
    }

    pub fn rttvar(&self) -> Duration {
        Duration::from_micros(self.rttvar_us.max(0) as u64)
    }

    pub fn last_sample(&self) -> Option<LatencySample> {
        self.last_sample
    }

    /// Time since the most recent probe was sent, if any was.
    pub fn since_last_probe(&self, now: Instant) -> Option<Duration> {
        self.last_probe_at.map(|at| now.saturating_duration_since(at))
    }

    /// Number of expiry rounds in a row that timed out at least one probe.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn expired_count(&self) -> u64 {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_register_and_complete() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();

        assert!(tracker.register(42, t0));
        assert!(tracker.is_outstanding(42));

        let sample = tracker.complete(42, 57, t0 + Duration::from_millis(80)).unwrap();
        assert_eq!(sample.token, 42);
        assert_eq!(sample.rtt, Duration::from_millis(80));
        assert_eq!(sample.reported_ms, 57);
        assert!(!tracker.is_outstanding(42));
        assert_eq!(tracker.completed_count(), 1);
        assert_eq!(tracker.last_sample(), Some(sample));
    }

    #[test]
    fn test_complete_unknown_token() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        assert!(tracker.complete(42, 1, t0).is_none());

        tracker.register(42, t0);
        assert!(tracker.complete(42, 1, t0).is_some());
        // Second reply for the same token is stale
        assert!(tracker.complete(42, 1, t0).is_none());
    }

    #[test]
    fn test_register_rejects_zero_and_duplicate() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        assert!(!tracker.register(0, t0));
        assert!(tracker.register(5, t0));
        assert!(!tracker.register(5, t0));
        assert_eq!(tracker.outstanding_count(), 1);
    }

    #[test]
    fn test_next_token_avoids_outstanding() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();

        // Same seed yields the same first draw; once it is outstanding the
        // tracker must pick something else.
        let first = tracker.next_token(&mut StdRng::seed_from_u64(7));
        tracker.register(first, t0);
        let second = tracker.next_token(&mut StdRng::seed_from_u64(7));

        assert_ne!(first, 0);
        assert_ne!(second, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_expire() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        tracker.register(1, t0);
        tracker.register(2, t0 + Duration::from_millis(500));

        let expired = tracker.expire(t0 + Duration::from_millis(1000), Duration::from_millis(1000));
        assert_eq!(expired, vec![1]);
        assert!(!tracker.is_outstanding(1));
        assert!(tracker.is_outstanding(2));
        assert_eq!(tracker.consecutive_timeouts(), 1);
        assert_eq!(tracker.expired_count(), 1);

        // Nothing due: counter unchanged
        assert!(tracker
            .expire(t0 + Duration::from_millis(1100), Duration::from_millis(1000))
            .is_empty());
        assert_eq!(tracker.consecutive_timeouts(), 1);
    }

    #[test]
    fn test_completion_resets_timeouts() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        tracker.register(1, t0);
        tracker.expire(t0 + Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(tracker.consecutive_timeouts(), 1);

        tracker.register(2, t0 + Duration::from_secs(5));
        tracker.complete(2, 3, t0 + Duration::from_secs(6));
        assert_eq!(tracker.consecutive_timeouts(), 0);
    }

    #[test]
    fn test_srtt_smoothing() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        assert!(tracker.srtt().is_none());

        tracker.register(1, t0);
        tracker.complete(1, 1, t0 + Duration::from_millis(100));
        assert_eq!(tracker.srtt(), Some(Duration::from_millis(100)));
        assert_eq!(tracker.rttvar(), Duration::from_millis(50));

        tracker.register(2, t0);
        tracker.complete(2, 1, t0 + Duration::from_millis(180));
        // srtt += (180 - 100) / 8 = 110ms
        assert_eq!(tracker.srtt(), Some(Duration::from_millis(110)));
        // rttvar += (80 - 50) / 4 = 57.5ms
        assert_eq!(tracker.rttvar(), Duration::from_micros(57_500));
    }

    #[test]
    fn test_since_last_probe() {
        let mut tracker = LatencyTracker::new();
        let t0 = Instant::now();
        assert!(tracker.since_last_probe(t0).is_none());
        tracker.register(9, t0);
        assert_eq!(
            tracker.since_last_probe(t0 + Duration::from_millis(250)),
            Some(Duration::from_millis(250))
        );
    }
}
