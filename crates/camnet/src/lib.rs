// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # camnet - CAM beacon exchange
//!
//! Simulates the exchange of Cooperative Awareness Messages (CAM), the
//! periodic beacons vehicles broadcast in ETSI ITS-G5, over plain UDP.
//! Each node replays a recorded kinematic trace at a fixed cadence while
//! concurrently listening for, self-filtering, and surfacing peer beacons.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camnet::{CamNode, NodeConfig, TraceFileSource};
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let source = TraceFileSource::open("trace.txt")?;
//!     let stop = Arc::new(AtomicBool::new(false));
//!
//!     let node = CamNode::spawn(
//!         &config,
//!         Box::new(source),
//!         Arc::new(|beacon, src| println!("peer {} from {}", beacon.node_id(), src)),
//!         stop,
//!     )?;
//!
//!     let summary = node.join();
//!     println!("{} beacon(s) sent", summary.beacons_sent);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                           CamNode                            |
//! |       spawn both loops, share one stop flag, join both       |
//! +------------------------------+-------------------------------+
//! |           CamSender          |          CamReceiver          |
//! |  trace -> CamMessage -> JSON |  JSON -> CamMessage -> filter |
//! |  one datagram per interval   |  -> BeaconHandler callback    |
//! +------------------------------+-------------------------------+
//! |                       UDP (port 37020)                       |
//! |        subnet broadcast or unicast, best-effort only         |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CamMessage`] | One beacon: header plus cooperative awareness body |
//! | [`CamNode`] | Paired sender/receiver over one shared stop flag |
//! | [`SampleSource`] | Ordered, finite supply of kinematic samples |
//! | [`SelfFilter`] | Discards the node's own beacons on receive |
//! | [`NodeConfig`] | Per-node settings, loadable from JSON |
//!
//! ## Modules Overview
//!
//! - [`cam`] - Beacon data model and the generation delta time rule
//! - [`codec`] - JSON wire codec
//! - [`source`] - Trace-file and in-memory sample sources
//! - [`sender`] / [`receiver`] - The two beacon loops
//! - [`node`] - Lifecycle controller tying the loops together
//! - [`config`] - Wire constants and per-node configuration
//! - [`transport`] - UDP socket construction

/// CAM data model (header, containers, generation delta time).
pub mod cam;
/// Wire codec: beacon to and from a UTF-8 JSON datagram payload.
pub mod codec;
/// Wire constants and per-node configuration.
pub mod config;
/// Node lifecycle: paired sender/receiver over one stop flag.
pub mod node;
/// Beacon receiver loop, self-filter, and receive metrics.
pub mod receiver;
/// Periodic beacon sender loop.
pub mod sender;
/// Sample sources (trace files, in-memory traces).
pub mod source;
/// UDP socket construction and local address resolution.
pub mod transport;

pub use cam::{generation_delta_time_at, CamMessage, MessageId, PlatoonProfile, StationType};
pub use codec::{decode, encode, CodecError};
pub use config::{ConfigError, FilterPolicy, NodeConfig};
pub use node::{CamNode, NodeError, NodeSummary};
pub use receiver::{BeaconHandler, CamReceiver, ReceiverMetrics, SelfFilter};
pub use sender::CamSender;
pub use source::{CamSample, SampleSource, TraceFileSource, VecSource};
