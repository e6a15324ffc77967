//! Node configuration subsections.
//!
//! All the `node.*` configuration parameters: latency probing policy and
//! internal channel sizing. Every tunable is optional in the file; the
//! accessors fill in defaults so that a higher-priority file can set any
//! value, including one equal to its default.

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Default interval between probes on an idle originator path (5 s).
const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;

/// Default outstanding probe lifetime (10 s).
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Default cap on unanswered probes per path.
const DEFAULT_MAX_OUTSTANDING: usize = 8;

/// Default number of immediate resends after timeouts.
const DEFAULT_MAX_RESENDS: u32 = 3;

/// Default latency reported by a responder without its own measurement.
const DEFAULT_ECHO_LATENCY_MS: u64 = 1;

/// Default channel capacity.
const DEFAULT_CHANNEL_BUFFER: usize = 1024;

/// Default maintenance tick period (1 s).
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

fn nonzero<T: Default + PartialEq>(value: Option<T>, field: &'static str) -> Result<(), ConfigError> {
    match value {
        Some(v) if v == T::default() => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero",
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// Node Configuration Subsections
// ============================================================================

/// Latency probe policy (`node.latency.*`).
///
/// Timeout and resend behavior belong to the path owner, not to the probe
/// message itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Interval between probes on an idle originator path in ms
    /// (`node.latency.probe_interval_ms`). Defaults to 5000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_interval_ms: Option<u64>,
    /// Outstanding probe lifetime in ms (`node.latency.probe_timeout_ms`).
    /// Defaults to 10000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,
    /// Max unanswered probes per path (`node.latency.max_outstanding`).
    /// Defaults to 8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_outstanding: Option<usize>,
    /// Immediate resends after consecutive timeouts
    /// (`node.latency.max_resends`). Defaults to 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resends: Option<u32>,
    /// Latency a responder reports when it has no measurement of its own
    /// (`node.latency.echo_latency_ms`). Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_latency_ms: Option<u64>,
}

impl LatencyConfig {
    pub fn probe_interval_ms(&self) -> u64 {
        self.probe_interval_ms.unwrap_or(DEFAULT_PROBE_INTERVAL_MS)
    }

    pub fn probe_timeout_ms(&self) -> u64 {
        self.probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.unwrap_or(DEFAULT_MAX_OUTSTANDING)
    }

    pub fn max_resends(&self) -> u32 {
        self.max_resends.unwrap_or(DEFAULT_MAX_RESENDS)
    }

    pub fn echo_latency_ms(&self) -> u64 {
        self.echo_latency_ms.unwrap_or(DEFAULT_ECHO_LATENCY_MS)
    }

    /// Override every field that is set in `other`.
    pub fn merge(&mut self, other: LatencyConfig) {
        if other.probe_interval_ms.is_some() {
            self.probe_interval_ms = other.probe_interval_ms;
        }
        if other.probe_timeout_ms.is_some() {
            self.probe_timeout_ms = other.probe_timeout_ms;
        }
        if other.max_outstanding.is_some() {
            self.max_outstanding = other.max_outstanding;
        }
        if other.max_resends.is_some() {
            self.max_resends = other.max_resends;
        }
        if other.echo_latency_ms.is_some() {
            self.echo_latency_ms = other.echo_latency_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero(self.probe_timeout_ms, "node.latency.probe_timeout_ms")?;
        nonzero(self.max_outstanding, "node.latency.max_outstanding")
    }
}

/// Internal buffers (`node.buffers.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffersConfig {
    /// Inbound frame channel capacity (`node.buffers.inbound_channel`).
    /// Defaults to 1024.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_channel: Option<usize>,
    /// Outbound message channel capacity (`node.buffers.outbound_channel`).
    /// Defaults to 1024.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_channel: Option<usize>,
}

impl BuffersConfig {
    pub fn inbound_channel(&self) -> usize {
        self.inbound_channel.unwrap_or(DEFAULT_CHANNEL_BUFFER)
    }

    pub fn outbound_channel(&self) -> usize {
        self.outbound_channel.unwrap_or(DEFAULT_CHANNEL_BUFFER)
    }

    pub fn merge(&mut self, other: BuffersConfig) {
        if other.inbound_channel.is_some() {
            self.inbound_channel = other.inbound_channel;
        }
        if other.outbound_channel.is_some() {
            self.outbound_channel = other.outbound_channel;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero(self.inbound_channel, "node.buffers.inbound_channel")?;
        nonzero(self.outbound_channel, "node.buffers.outbound_channel")
    }
}

// ============================================================================
// Node Configuration (Root)
// ============================================================================

/// Node configuration (`node.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name used in log output (`node.name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path maintenance tick period in ms (`node.tick_interval_ms`).
    /// Defaults to 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<u64>,

    /// Latency probing (`node.latency.*`).
    #[serde(default)]
    pub latency: LatencyConfig,

    /// Internal buffers (`node.buffers.*`).
    #[serde(default)]
    pub buffers: BuffersConfig,
}

impl NodeConfig {
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero(self.tick_interval_ms, "node.tick_interval_ms")?;
        self.latency.validate()?;
        self.buffers.validate()
    }
}
