// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node lifecycle: one sender and one receiver over a shared stop flag.
//!
//! The two loops share nothing else. A run ends when the trace is
//! exhausted (the sender raises the flag) or when some collaborator, a
//! signal handler included, raises it.

use crate::cam::CamMessage;
use crate::config::{ConfigError, NodeConfig};
use crate::receiver::{BeaconHandler, CamReceiver, SelfFilter};
use crate::sender::CamSender;
use crate::source::SampleSource;
use crate::transport;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Node startup failures.
#[derive(Debug)]
pub enum NodeError {
    /// Rejected configuration.
    Config(ConfigError),
    /// Socket setup or thread spawn failure. Fatal at startup: a node
    /// without both endpoints is not a node.
    Transport(io::Error),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Config(e) => write!(f, "config error: {}", e),
            NodeError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<ConfigError> for NodeError {
    fn from(e: ConfigError) -> Self {
        NodeError::Config(e)
    }
}

impl From<io::Error> for NodeError {
    fn from(e: io::Error) -> Self {
        NodeError::Transport(e)
    }
}

/// End-of-run accounting for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSummary {
    pub beacons_sent: u64,
    pub packets_received: u64,
    pub beacons_accepted: u64,
    pub beacons_filtered: u64,
    pub packets_malformed: u64,
}

/// One simulated node: beacon sender plus beacon receiver.
pub struct CamNode {
    sender: Option<CamSender>,
    receiver: Option<CamReceiver>,
    stop: Arc<AtomicBool>,
    port: u16,
}

impl CamNode {
    /// Validate the config, bind both sockets, and spawn both loops.
    ///
    /// `stop` is the run's only cancellation signal; hand the same flag to
    /// a signal handler to get clean Ctrl+C behavior. With `config.port ==
    /// 0` the listener takes an OS-assigned port and the sender targets it
    /// (loopback testing); otherwise both use the configured port.
    pub fn spawn(
        config: &NodeConfig,
        source: Box<dyn SampleSource + Send>,
        handler: BeaconHandler,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        // Listener first, so an OS-assigned port is known before the sender
        // needs a destination.
        let listener = transport::listener_socket(config.port, config.recv_timeout())?;
        let port = listener.local_addr()?.port();
        let destination = SocketAddr::new(config.destination, port);

        let filter = SelfFilter::from_policy(config.filter, config.node_id)?;
        let receiver = CamReceiver::spawn(listener, Some(filter), handler, Arc::clone(&stop))?;

        let outbound = transport::broadcast_socket()?;
        let sender = CamSender::spawn(
            CamMessage::new(config.node_id),
            source,
            outbound,
            destination,
            config.interval(),
            Arc::clone(&stop),
        )?;

        log::info!(
            "[node] nodeId={} beaconing to {} every {}ms, filter {:?}",
            config.node_id,
            destination,
            config.interval_ms,
            config.filter
        );

        Ok(Self {
            sender: Some(sender),
            receiver: Some(receiver),
            stop,
            port,
        })
    }

    /// The shared stop flag.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Raise the stop flag. Both loops wind down within one receive
    /// timeout.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Port the receiver is actually bound to (differs from the configured
    /// port only when that was 0).
    pub fn listen_port(&self) -> u16 {
        self.port
    }

    /// Wait for the run to end and return the final accounting.
    ///
    /// Joins the sender first (trace exhaustion is the normal ending), then
    /// makes sure the flag is up before waiting on the receiver.
    pub fn join(mut self) -> NodeSummary {
        let beacons_sent = match self.sender.take() {
            Some(sender) => sender.join(),
            None => 0,
        };
        self.stop.store(true, Ordering::Relaxed);

        let mut summary = NodeSummary {
            beacons_sent,
            packets_received: 0,
            beacons_accepted: 0,
            beacons_filtered: 0,
            packets_malformed: 0,
        };
        if let Some(receiver) = self.receiver.take() {
            let metrics = Arc::clone(&receiver.metrics);
            receiver.join();
            let (received, accepted, filtered, malformed, _bytes, _handler_errors) =
                metrics.snapshot();
            summary.packets_received = received;
            summary.beacons_accepted = accepted;
            summary.beacons_filtered = filtered;
            summary.packets_malformed = malformed;
        }

        log::info!(
            "[node] run complete: {} sent, {} accepted, {} filtered, {} malformed",
            summary.beacons_sent,
            summary.beacons_accepted,
            summary.beacons_filtered,
            summary.packets_malformed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterPolicy;
    use crate::source::VecSource;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::{Duration, Instant};

    fn loopback_config() -> NodeConfig {
        NodeConfig {
            node_id: 0,
            destination: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            interval_ms: 10,
            recv_timeout_ms: 200,
            filter: FilterPolicy::NodeId,
        }
    }

    fn no_op_handler() -> BeaconHandler {
        Arc::new(|_message, _src| {})
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let config = NodeConfig {
            interval_ms: 0,
            ..loopback_config()
        };
        let stop = Arc::new(AtomicBool::new(false));
        let result = CamNode::spawn(
            &config,
            Box::new(VecSource::new(Vec::new())),
            no_op_handler(),
            stop,
        );
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn test_empty_trace_ends_the_run_immediately() {
        let stop = Arc::new(AtomicBool::new(false));
        let node = CamNode::spawn(
            &loopback_config(),
            Box::new(VecSource::new(Vec::new())),
            no_op_handler(),
            Arc::clone(&stop),
        )
        .expect("spawn node");

        let started = Instant::now();
        let summary = node.join();
        assert_eq!(summary.beacons_sent, 0);
        assert!(stop.load(Ordering::Relaxed));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "empty trace should end within one receive timeout"
        );
    }

    #[test]
    fn test_request_stop_ends_a_long_run() {
        let samples = (0..10_000)
            .map(|i| {
                crate::source::CamSample::from_values([
                    f64::from(i),
                    0.0,
                    1.0,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                ])
            })
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let node = CamNode::spawn(
            &loopback_config(),
            Box::new(VecSource::new(samples)),
            no_op_handler(),
            stop,
        )
        .expect("spawn node");

        std::thread::sleep(Duration::from_millis(50));
        node.request_stop();

        let started = Instant::now();
        let summary = node.join();
        assert!(summary.beacons_sent < 10_000);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "stop was not observed within one receive timeout"
        );
    }

    #[test]
    fn test_listen_port_reports_the_bound_port() {
        let stop = Arc::new(AtomicBool::new(false));
        let node = CamNode::spawn(
            &loopback_config(),
            Box::new(VecSource::new(Vec::new())),
            no_op_handler(),
            stop,
        )
        .expect("spawn node");
        assert_ne!(node.listen_port(), 0);
        node.join();
    }
}
