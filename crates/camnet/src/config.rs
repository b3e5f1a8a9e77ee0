// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and per-node configuration.
//!
//! All wire and timing constants live here. **Never hardcode these values
//! elsewhere!** [`NodeConfig`] carries the per-node runtime settings and can
//! be loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Wire constants (ETSI ITS-G5 CAM, simplified profile)
// ============================================================================

/// Well-known CAM beacon port. Every node listens here and every beacon is
/// addressed here.
pub const CAM_PORT: u16 = 37020;

/// ItsPduHeader protocol version emitted by this stack.
pub const PROTOCOL_VERSION: u8 = 2;

/// Unix timestamp (milliseconds) of the ITS epoch, 2004-01-01T00:00:00Z.
/// `generationDeltaTime` is measured from this instant.
pub const ITS_EPOCH_UNIX_MS: i64 = 1_072_915_200_000;

/// `generationDeltaTime` is a 16-bit rolling counter wrapping at this value.
pub const GENERATION_DELTA_TIME_WRAP: i64 = 65_536;

/// Largest datagram the receiver accepts. One beacon is ~400 bytes of JSON;
/// anything bigger than this is not ours.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

// ============================================================================
// Timing defaults
// ============================================================================

/// Beacon cadence in milliseconds (CAM high-frequency rate, 10 Hz).
pub const BEACON_INTERVAL_MS: u64 = 100;

/// Receiver blocking-read timeout in milliseconds. Bounds how long the
/// receive loop can go without observing the stop flag.
pub const RECV_TIMEOUT_MS: u64 = 1_000;

/// Granularity of the sender's inter-beacon sleep in milliseconds. The
/// sleep is split into chunks of this size so a stop request is observed
/// promptly.
pub const STOP_POLL_INTERVAL_MS: u64 = 25;

/// Default beacon destination: limited broadcast. Deployments on a routed
/// segment override this with their subnet broadcast address
/// (e.g. 10.15.4.255) or a unicast peer.
pub const DEFAULT_DESTINATION: IpAddr = IpAddr::V4(Ipv4Addr::BROADCAST);

// ============================================================================
// Self-filter policy
// ============================================================================

/// How a receiver decides that an inbound beacon is its own transmission
/// echoed back by the broadcast medium.
///
/// `SourceAddress` compares the datagram's source IP against this host's
/// addresses and works no matter what the payload claims. `NodeId` compares
/// the decoded `nodeId` against our own id; it is the right choice when
/// several nodes share one host and therefore one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPolicy {
    SourceAddress,
    NodeId,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::SourceAddress
    }
}

impl std::str::FromStr for FilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source-address" | "address" | "addr" | "a" => Ok(Self::SourceAddress),
            "node-id" | "nodeid" | "id" | "n" => Ok(Self::NodeId),
            _ => Err(format!(
                "Unknown filter policy: {} (use 'source-address' or 'node-id')",
                s
            )),
        }
    }
}

// ============================================================================
// Per-node configuration
// ============================================================================

/// Runtime settings for one node.
///
/// Defaults mirror the constants above; a JSON config file may override any
/// subset of the fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity stamped into outbound beacons and compared by the node-id
    /// filter policy.
    #[serde(default)]
    pub node_id: u32,

    /// Beacon destination address (subnet broadcast or unicast peer).
    #[serde(default = "default_destination")]
    pub destination: IpAddr,

    /// UDP port used for both sending and listening. Port 0 asks the OS for
    /// an ephemeral listener port and aims the sender at it (loopback
    /// testing).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Beacon interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Receiver read timeout in milliseconds.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    /// Self-origination filter policy.
    #[serde(default)]
    pub filter: FilterPolicy,
}

fn default_destination() -> IpAddr {
    DEFAULT_DESTINATION
}

fn default_port() -> u16 {
    CAM_PORT
}

fn default_interval_ms() -> u64 {
    BEACON_INTERVAL_MS
}

fn default_recv_timeout_ms() -> u64 {
    RECV_TIMEOUT_MS
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            destination: default_destination(),
            port: default_port(),
            interval_ms: default_interval_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
            filter: FilterPolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a JSON file (pretty-printed).
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Check the settings for values the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.recv_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "recv_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.destination.is_unspecified() {
            return Err(ConfigError::InvalidValue(
                "destination must not be the unspecified address".to_string(),
            ));
        }
        Ok(())
    }

    /// Beacon interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Receiver read timeout as a [`Duration`].
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Full destination socket address (destination IP + configured port).
    pub fn destination_addr(&self) -> SocketAddr {
        SocketAddr::new(self.destination, self.port)
    }
}

/// Configuration errors.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File I/O error
    IoError(String),
    /// JSON parsing error
    ParseError(String),
    /// Serialization error
    SerializeError(String),
    /// Invalid configuration value
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
