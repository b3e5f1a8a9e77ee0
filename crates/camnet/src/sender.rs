// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic beacon sender.
//!
//! Owns the node's live [`CamMessage`] and the outbound socket. Every
//! interval it pulls one sample, rewrites the beacon in place, re-stamps
//! the generation delta time, and fires exactly one datagram.

use crate::cam::CamMessage;
use crate::codec;
use crate::config::STOP_POLL_INTERVAL_MS;
use crate::source::SampleSource;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Handle to the background sender thread.
///
/// The thread stops on its own when the sample source is exhausted, raising
/// the shared stop flag so a paired receiver winds down too, or when the
/// flag is raised externally. Dropping the handle requests a stop and joins.
pub struct CamSender {
    handle: Option<JoinHandle<u64>>,
    stop: Arc<AtomicBool>,
}

impl CamSender {
    /// Spawn the sender thread.
    ///
    /// `cam` is owned and mutated exclusively by the thread. `stop` is the
    /// cooperative shutdown flag shared with the rest of the node; the
    /// sender both polls it and raises it on exhaustion.
    pub fn spawn(
        cam: CamMessage,
        source: Box<dyn SampleSource + Send>,
        socket: UdpSocket,
        destination: SocketAddr,
        interval: Duration,
        stop: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let stop_clone = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("camnet-tx".to_string())
            .spawn(move || sender_loop(cam, source, socket, destination, interval, &stop_clone))?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Wait for the thread to finish on its own terms (source exhaustion or
    /// an externally raised stop). Returns the number of beacons sent.
    pub fn join(mut self) -> u64 {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(0),
            None => 0,
        }
    }

    /// Raise the stop flag and wait for completion. Returns the number of
    /// beacons sent.
    pub fn shutdown(mut self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for CamSender {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn sender_loop(
    mut cam: CamMessage,
    mut source: Box<dyn SampleSource + Send>,
    socket: UdpSocket,
    destination: SocketAddr,
    interval: Duration,
    stop: &AtomicBool,
) -> u64 {
    log::debug!("[sender] beaconing to {} every {:?}", destination, interval);
    let mut sent = 0u64;

    loop {
        if stop.load(Ordering::Relaxed) {
            log::debug!("[sender] stop requested after {} beacons", sent);
            break;
        }

        let sample = match source.next_sample() {
            Some(sample) => sample,
            None => {
                // Normal end of the trajectory, not an error. Raise the
                // shared flag so a paired receiver winds down too.
                log::info!("[sender] sample source exhausted after {} beacons", sent);
                stop.store(true, Ordering::Relaxed);
                break;
            }
        };

        cam.apply_sample(&sample);
        cam.cam.refresh_timestamp();

        match codec::encode(&cam) {
            Ok(payload) => match socket.send_to(&payload, destination) {
                Ok(bytes) => {
                    sent += 1;
                    log::debug!(
                        "[sender] beacon #{} ({} bytes, nodeId={}, deltaTime={})",
                        sent,
                        bytes,
                        sample.node_id,
                        cam.cam.generation_delta_time
                    );
                }
                // Beacons are best-effort; a failed send costs one cycle.
                Err(e) => log::warn!("[sender] send to {} failed: {}", destination, e),
            },
            Err(e) => log::warn!("[sender] beacon encode failed: {}", e),
        }

        sleep_interval(interval, stop);
    }

    sent
}

/// Sleep one beacon interval in small chunks so a stop request is observed
/// promptly.
fn sleep_interval(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    let chunk = Duration::from_millis(STOP_POLL_INTERVAL_MS);
    while Instant::now() < deadline {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(remaining.min(chunk));
    }
}
