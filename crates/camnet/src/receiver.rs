// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Beacon receiver: accept, decode, self-filter, hand off.
//!
//! One blocking-read loop per node. Malformed datagrams and transient
//! socket errors are counted and skipped; nothing that happens on the
//! receive path can take the loop down.

use crate::cam::CamMessage;
use crate::codec;
use crate::config::{FilterPolicy, MAX_DATAGRAM_SIZE};
use crate::transport;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Callback invoked for every accepted (non-self) beacon.
pub type BeaconHandler = Arc<dyn Fn(CamMessage, SocketAddr) + Send + Sync>;

/// Self-origination filter: decides whether an inbound beacon is this
/// node's own transmission echoed back by the broadcast medium.
#[derive(Debug, Clone)]
pub enum SelfFilter {
    /// Discard datagrams whose source IP is one of this host's addresses.
    /// Works no matter what the payload claims, including fleets where
    /// every node carries `nodeId` 0.
    SourceAddress { local: Vec<IpAddr> },
    /// Discard beacons whose decoded `nodeId` equals our own. The right
    /// choice when several nodes share one host and one address.
    NodeId { own_id: u32 },
}

impl SelfFilter {
    /// Address filter over this host's resolved addresses.
    pub fn by_source_address() -> io::Result<Self> {
        Ok(Self::SourceAddress {
            local: transport::local_addresses()?,
        })
    }

    /// Address filter over an explicit address list (tests, exotic
    /// topologies).
    pub fn with_addresses(local: Vec<IpAddr>) -> Self {
        Self::SourceAddress { local }
    }

    /// Node-id filter for `own_id`.
    pub fn by_node_id(own_id: u32) -> Self {
        Self::NodeId { own_id }
    }

    /// Build the filter a [`FilterPolicy`] selects.
    pub fn from_policy(policy: FilterPolicy, own_id: u32) -> io::Result<Self> {
        match policy {
            FilterPolicy::SourceAddress => Self::by_source_address(),
            FilterPolicy::NodeId => Ok(Self::by_node_id(own_id)),
        }
    }

    /// True if the beacon is self-originated under this policy.
    ///
    /// The address policy compares IPs only; the sender transmits from an
    /// ephemeral port, so ports never match.
    pub fn is_own(&self, message: &CamMessage, src: SocketAddr) -> bool {
        match self {
            Self::SourceAddress { local } => local.contains(&src.ip()),
            Self::NodeId { own_id } => message.node_id() == *own_id,
        }
    }
}

/// Receive-side counters, written by the receiver thread with relaxed
/// atomics.
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    /// Datagrams pulled off the socket.
    pub packets_received: AtomicU64,
    /// Beacons handed to the callback.
    pub beacons_accepted: AtomicU64,
    /// Beacons discarded by the self-filter.
    pub beacons_filtered: AtomicU64,
    /// Datagrams that failed to decode.
    pub packets_malformed: AtomicU64,
    /// Total payload bytes pulled off the socket.
    pub bytes_received: AtomicU64,
    /// Handler panics caught at the callback boundary.
    pub handler_errors: AtomicU64,
}

impl ReceiverMetrics {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot as `(received, accepted, filtered, malformed, bytes,
    /// handler_errors)`.
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64, u64) {
        (
            self.packets_received.load(Ordering::Relaxed),
            self.beacons_accepted.load(Ordering::Relaxed),
            self.beacons_filtered.load(Ordering::Relaxed),
            self.packets_malformed.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.handler_errors.load(Ordering::Relaxed),
        )
    }
}

/// Handle to the background receiver thread.
pub struct CamReceiver {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    /// Live counters for this receiver.
    pub metrics: Arc<ReceiverMetrics>,
}

impl CamReceiver {
    /// Spawn the receiver thread over an already-bound listener socket.
    ///
    /// The socket must carry a read timeout (see
    /// [`transport::listener_socket`]); it bounds how long the loop can
    /// block without observing `stop`. `filter: None` accepts everything,
    /// which is what a pure monitor wants.
    pub fn spawn(
        socket: UdpSocket,
        filter: Option<SelfFilter>,
        handler: BeaconHandler,
        stop: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let metrics = ReceiverMetrics::new();
        let metrics_clone = Arc::clone(&metrics);
        let stop_clone = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("camnet-rx".to_string())
            .spawn(move || {
                receiver_loop(&socket, filter.as_ref(), &handler, &stop_clone, &metrics_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            stop,
            metrics,
        })
    }

    /// Raise the stop flag and wait for the thread to exit. Returns within
    /// roughly one read timeout.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Wait without raising the stop flag; some collaborator (paired
    /// sender, signal handler) is expected to raise it.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CamReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn receiver_loop(
    socket: &UdpSocket,
    filter: Option<&SelfFilter>,
    handler: &BeaconHandler,
    stop: &AtomicBool,
    metrics: &ReceiverMetrics,
) {
    match socket.local_addr() {
        Ok(addr) => log::debug!("[receiver] listening on {}", addr),
        Err(_) => log::debug!("[receiver] listening"),
    }

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while !stop.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(result) => result,
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                // Read timeout; take another look at the stop flag.
                continue;
            }
            Err(e) => {
                log::warn!("[receiver] recv error: {}", e);
                continue;
            }
        };

        metrics.packets_received.fetch_add(1, Ordering::Relaxed);
        metrics.bytes_received.fetch_add(len as u64, Ordering::Relaxed);

        let message = match codec::decode(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                metrics.packets_malformed.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[receiver] dropping malformed datagram from {} ({} bytes): {}",
                    src,
                    len,
                    e
                );
                continue;
            }
        };

        if let Some(filter) = filter {
            if filter.is_own(&message, src) {
                metrics.beacons_filtered.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[receiver] filtered own beacon from {} (nodeId={})",
                    src,
                    message.node_id()
                );
                continue;
            }
        }

        metrics.beacons_accepted.fetch_add(1, Ordering::Relaxed);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(message, src);
        }));
        if result.is_err() {
            metrics.handler_errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("[receiver] beacon handler panicked on datagram from {}", src);
        }
    }

    log::debug!("[receiver] stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cam::CamMessage;
    use crate::source::CamSample;
    use crate::transport;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn beacon_payload(node_id: u32) -> Vec<u8> {
        let mut message = CamMessage::new(node_id);
        message.apply_sample(&CamSample {
            distance: 10.5,
            relative_speed: 1.2,
            node_id,
            acceleration: 2.0,
            controller_acceleration: 1.5,
            speed: 60.0,
            posx: 100.0,
            posy: 200.0,
        });
        codec::encode(&message).expect("encode")
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn test_node_id_filter_discards_own_id_only() {
        let filter = SelfFilter::by_node_id(0);
        let src: SocketAddr = "192.168.1.50:40000".parse().unwrap();

        let own = CamMessage::new(0);
        let peer = CamMessage::new(7);
        assert!(filter.is_own(&own, src));
        assert!(!filter.is_own(&peer, src));
    }

    #[test]
    fn test_address_filter_matches_source_ip_regardless_of_node_id() {
        let filter = SelfFilter::with_addresses(vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        ]);

        let own_addr: SocketAddr = "10.0.0.5:41234".parse().unwrap();
        let peer_addr: SocketAddr = "10.0.0.6:41234".parse().unwrap();

        // Same payload either way; only the source address decides.
        let message = CamMessage::new(3);
        assert!(filter.is_own(&message, own_addr));
        assert!(!filter.is_own(&message, peer_addr));
    }

    #[test]
    fn test_accepts_decodes_and_counts_beacons() {
        let listener =
            transport::listener_socket(0, Duration::from_millis(100)).expect("bind listener");
        let port = listener.local_addr().unwrap().port();

        let seen: Arc<Mutex<Vec<(u32, SocketAddr)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: BeaconHandler = Arc::new(move |message, src| {
            seen_clone.lock().unwrap().push((message.node_id(), src));
        });

        let stop = Arc::new(AtomicBool::new(false));
        let receiver =
            CamReceiver::spawn(listener, None, handler, Arc::clone(&stop)).expect("spawn receiver");

        let tx = UdpSocket::bind("127.0.0.1:0").expect("tx socket");
        // Garbage first: the loop must shrug it off and keep decoding.
        tx.send_to(b"{not json", (Ipv4Addr::LOCALHOST, port)).unwrap();
        tx.send_to(&beacon_payload(5), (Ipv4Addr::LOCALHOST, port)).unwrap();
        tx.send_to(&beacon_payload(6), (Ipv4Addr::LOCALHOST, port)).unwrap();

        let metrics = Arc::clone(&receiver.metrics);
        assert!(
            wait_until(Duration::from_secs(2), || {
                metrics.beacons_accepted.load(Ordering::Relaxed) == 2
            }),
            "beacons did not arrive"
        );
        receiver.shutdown();

        let (received, accepted, filtered, malformed, bytes, handler_errors) = metrics.snapshot();
        assert_eq!(received, 3);
        assert_eq!(accepted, 2);
        assert_eq!(filtered, 0);
        assert_eq!(malformed, 1);
        assert!(bytes > 0);
        assert_eq!(handler_errors, 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 5);
        assert_eq!(seen[1].0, 6);
    }

    #[test]
    fn test_node_id_filter_applies_on_the_receive_path() {
        let listener =
            transport::listener_socket(0, Duration::from_millis(100)).expect("bind listener");
        let port = listener.local_addr().unwrap().port();

        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: BeaconHandler = Arc::new(move |message, _src| {
            seen_clone.lock().unwrap().push(message.node_id());
        });

        let stop = Arc::new(AtomicBool::new(false));
        let receiver = CamReceiver::spawn(
            listener,
            Some(SelfFilter::by_node_id(0)),
            handler,
            Arc::clone(&stop),
        )
        .expect("spawn receiver");

        let tx = UdpSocket::bind("127.0.0.1:0").expect("tx socket");
        tx.send_to(&beacon_payload(0), (Ipv4Addr::LOCALHOST, port)).unwrap();
        tx.send_to(&beacon_payload(7), (Ipv4Addr::LOCALHOST, port)).unwrap();

        let metrics = Arc::clone(&receiver.metrics);
        assert!(
            wait_until(Duration::from_secs(2), || {
                metrics.packets_received.load(Ordering::Relaxed) == 2
            }),
            "datagrams did not arrive"
        );
        receiver.shutdown();

        let (_, accepted, filtered, _, _, _) = metrics.snapshot();
        assert_eq!(accepted, 1);
        assert_eq!(filtered, 1);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_address_filter_discards_loopback_traffic() {
        let listener =
            transport::listener_socket(0, Duration::from_millis(100)).expect("bind listener");
        let port = listener.local_addr().unwrap().port();

        let handler: BeaconHandler = Arc::new(|message, src| {
            panic!("own beacon leaked through: nodeId={} from {}", message.node_id(), src);
        });

        let stop = Arc::new(AtomicBool::new(false));
        let receiver = CamReceiver::spawn(
            listener,
            Some(SelfFilter::with_addresses(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])),
            handler,
            Arc::clone(&stop),
        )
        .expect("spawn receiver");

        let tx = UdpSocket::bind("127.0.0.1:0").expect("tx socket");
        tx.send_to(&beacon_payload(1), (Ipv4Addr::LOCALHOST, port)).unwrap();
        tx.send_to(&beacon_payload(2), (Ipv4Addr::LOCALHOST, port)).unwrap();

        let metrics = Arc::clone(&receiver.metrics);
        assert!(
            wait_until(Duration::from_secs(2), || {
                metrics.beacons_filtered.load(Ordering::Relaxed) == 2
            }),
            "beacons did not arrive"
        );
        receiver.shutdown();

        let (_, accepted, filtered, _, _, handler_errors) = metrics.snapshot();
        assert_eq!(accepted, 0);
        assert_eq!(filtered, 2);
        assert_eq!(handler_errors, 0);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let listener =
            transport::listener_socket(0, Duration::from_millis(100)).expect("bind listener");
        let port = listener.local_addr().unwrap().port();

        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: BeaconHandler = Arc::new(move |message, _src| {
            if message.node_id() == 13 {
                panic!("unlucky node");
            }
            seen_clone.lock().unwrap().push(message.node_id());
        });

        let stop = Arc::new(AtomicBool::new(false));
        let receiver =
            CamReceiver::spawn(listener, None, handler, Arc::clone(&stop)).expect("spawn receiver");

        let tx = UdpSocket::bind("127.0.0.1:0").expect("tx socket");
        tx.send_to(&beacon_payload(13), (Ipv4Addr::LOCALHOST, port)).unwrap();
        tx.send_to(&beacon_payload(7), (Ipv4Addr::LOCALHOST, port)).unwrap();

        let metrics = Arc::clone(&receiver.metrics);
        assert!(
            wait_until(Duration::from_secs(2), || {
                metrics.beacons_accepted.load(Ordering::Relaxed) == 2
            }),
            "beacons did not arrive"
        );
        receiver.shutdown();

        let (_, accepted, _, _, _, handler_errors) = metrics.snapshot();
        assert_eq!(accepted, 2);
        assert_eq!(handler_errors, 1);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_shutdown_returns_within_one_read_timeout() {
        let listener =
            transport::listener_socket(0, Duration::from_millis(200)).expect("bind listener");
        let handler: BeaconHandler = Arc::new(|_message, _src| {});
        let stop = Arc::new(AtomicBool::new(false));
        let receiver =
            CamReceiver::spawn(listener, None, handler, stop).expect("spawn receiver");

        let started = Instant::now();
        receiver.shutdown();
        assert!(
            started.elapsed() < Duration::from_millis(600),
            "shutdown took longer than one read timeout"
        );
    }
}
