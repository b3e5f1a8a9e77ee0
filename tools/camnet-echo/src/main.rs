// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! camnet-echo - print CAM beacons in real-time
//!
//! Monitor for the beacon channel: binds the well-known port and renders
//! every beacon field by field. By default nothing is filtered, so a node's
//! own broadcasts show up too; `--filter` enables self-suppression.

use camnet::config::{CAM_PORT, RECV_TIMEOUT_MS};
use camnet::{BeaconHandler, CamMessage, CamReceiver, FilterPolicy, SelfFilter};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "camnet-echo")]
#[command(version = "0.1.0")]
#[command(about = "Print CAM beacons in real-time (like rostopic echo)")]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value_t = CAM_PORT)]
    port: u16,

    /// Stop after printing this many beacons (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Self-filter policy: source-address or node-id (default: none)
    #[arg(short, long)]
    filter: Option<FilterPolicy>,

    /// Own node id, for the node-id filter policy
    #[arg(long, default_value = "0")]
    node_id: u32,

    /// Show header fields too (protocol version, message kind, delta time)
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Quiet mode - beacon data only, no banner or summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if args.no_color || !is_tty() {
        colored::control::set_override(false);
    }

    if let Err(e) = run_echo(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_echo(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    let listener =
        camnet::transport::listener_socket(args.port, Duration::from_millis(RECV_TIMEOUT_MS))?;
    let local = listener.local_addr()?;

    if !args.quiet {
        eprintln!(
            "{} Listening for CAM beacons on {}",
            ">>>".green().bold(),
            local.to_string().cyan()
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
        eprintln!();
    }

    let filter = match args.filter {
        Some(policy) => Some(SelfFilter::from_policy(policy, args.node_id)?),
        None => None,
    };

    let printed = Arc::new(AtomicU64::new(0));
    let handler: BeaconHandler = {
        let printed = Arc::clone(&printed);
        let stop = Arc::clone(&stop);
        let max = args.count;
        let verbose = args.verbose;
        Arc::new(move |message: CamMessage, src: SocketAddr| {
            let seq = printed.fetch_add(1, Ordering::SeqCst) + 1;
            if max > 0 && seq > max {
                stop.store(true, Ordering::Relaxed);
                return;
            }
            print_beacon(&message, src, seq, verbose);
            if max > 0 && seq == max {
                stop.store(true, Ordering::Relaxed);
            }
        })
    };

    let receiver = CamReceiver::spawn(listener, filter, handler, Arc::clone(&stop))?;

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }

    let metrics = Arc::clone(&receiver.metrics);
    receiver.shutdown();

    if !args.quiet {
        let (received, _accepted, filtered, malformed, _bytes, _handler_errors) =
            metrics.snapshot();
        let shown = match args.count {
            0 => printed.load(Ordering::SeqCst),
            max => printed.load(Ordering::SeqCst).min(max),
        };
        eprintln!();
        eprintln!(
            "{} Printed {} beacon(s) ({} datagram(s) received, {} filtered, {} malformed)",
            "---".dimmed(),
            shown,
            received,
            filtered,
            malformed
        );
    }
    Ok(())
}

fn print_beacon(message: &CamMessage, src: SocketAddr, seq: u64, verbose: bool) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    println!(
        "{} {} from {}",
        format!("[{}]", timestamp).dimmed(),
        format!("#{}", seq).yellow(),
        src.to_string().cyan()
    );

    if verbose {
        print_field("Protocol Version:", message.header.protocol_version);
        print_field("Message ID:", message.header.message_id);
        print_field(
            "Station Type:",
            message.cam.cam_parameters.basic_container.station_type,
        );
        print_field("Generation Delta Time:", message.cam.generation_delta_time);
    }

    let hf = &message.cam.cam_parameters.high_frequency_container;
    let pos = &message.cam.cam_parameters.basic_container.reference_position;
    print_field("Distance:", hf.distance);
    print_field("Relative Speed:", hf.relative_speed);
    print_field("Node ID:", hf.node_id);
    print_field("Acceleration:", hf.acceleration);
    print_field("Controller Acceleration:", hf.controller_acceleration);
    print_field("Speed:", hf.speed);
    print_field("Position X:", pos.posx);
    print_field("Position Y:", pos.posy);
    println!("{}", "-".repeat(50).dimmed());
}

// Pad before coloring; ANSI escapes would otherwise count toward the width.
fn print_field<V: std::fmt::Display>(label: &str, value: V) {
    println!("  {} {}", format!("{:<24}", label).cyan(), value);
}

#[cfg(unix)]
fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 }
}

#[cfg(not(unix))]
fn is_tty() -> bool {
    true
}
