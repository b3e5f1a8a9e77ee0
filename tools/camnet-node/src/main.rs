// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! camnet-node - one simulated CAM beacon node
//!
//! Replays a kinematic trace as CAM beacons over UDP while printing the
//! peer beacons it hears, the way a single platoon vehicle would. Can also
//! run one-sided (`--send-only`, `--recv-only`).

use camnet::{
    BeaconHandler, CamMessage, CamNode, CamReceiver, CamSender, FilterPolicy, NodeConfig,
    NodeSummary, SelfFilter, TraceFileSource,
};
use clap::Parser;
use colored::Colorize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "camnet-node")]
#[command(version = "0.1.0")]
#[command(about = "Broadcast a kinematic trace as CAM beacons and print peer beacons")]
struct Args {
    /// Trace file: one numeric value per line, eight lines per beacon
    #[arg(required_unless_present = "recv_only")]
    trace: Option<PathBuf>,

    /// Node id stamped into outbound beacons
    #[arg(short, long)]
    node_id: Option<u32>,

    /// Beacon destination (subnet broadcast or unicast peer)
    #[arg(short, long)]
    destination: Option<IpAddr>,

    /// UDP port for sending and listening
    #[arg(short, long)]
    port: Option<u16>,

    /// Beacon interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Self-filter policy: source-address or node-id
    #[arg(short, long)]
    filter: Option<FilterPolicy>,

    /// JSON config file (flags given here override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send beacons without listening
    #[arg(long, conflicts_with = "recv_only")]
    send_only: bool,

    /// Listen without sending (no trace needed)
    #[arg(long)]
    recv_only: bool,

    /// Quiet mode - suppress per-beacon output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    config.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    if args.recv_only {
        return run_recv_only(args, &config, stop);
    }

    let trace = args.trace.as_ref().ok_or("a trace file is required")?;
    let source = TraceFileSource::open(trace)?;

    if args.send_only {
        run_send_only(args, &config, source, stop)
    } else {
        run_node(args, &config, source, stop)
    }
}

/// Start from the config file (or defaults) and lay CLI flags on top.
fn build_config(args: &Args) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    if let Some(node_id) = args.node_id {
        config.node_id = node_id;
    }
    if let Some(destination) = args.destination {
        config.destination = destination;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(interval) = args.interval {
        config.interval_ms = interval;
    }
    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    Ok(config)
}

/// One line per accepted peer beacon, straight to stdout.
fn beacon_printer(quiet: bool) -> BeaconHandler {
    Arc::new(move |message: CamMessage, src: SocketAddr| {
        if quiet {
            return;
        }
        let hf = &message.cam.cam_parameters.high_frequency_container;
        let pos = &message.cam.cam_parameters.basic_container.reference_position;
        println!(
            "{} nodeId={} distance={} relativeSpeed={} acceleration={} controllerAcceleration={} speed={} pos=({}, {})",
            format!("[{}]", src).cyan(),
            hf.node_id.to_string().yellow(),
            hf.distance,
            hf.relative_speed,
            hf.acceleration,
            hf.controller_acceleration,
            hf.speed,
            pos.posx,
            pos.posy
        );
    })
}

fn run_node(
    args: &Args,
    config: &NodeConfig,
    source: TraceFileSource,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !args.quiet {
        eprintln!(
            "{} camnet node: nodeId={} -> {} every {}ms (filter: {:?})",
            ">>>".green().bold(),
            config.node_id,
            config.destination_addr(),
            config.interval_ms,
            config.filter
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    }

    let node = CamNode::spawn(config, Box::new(source), beacon_printer(args.quiet), stop)?;
    let summary = node.join();

    print_summary(&summary);
    Ok(())
}

fn run_send_only(
    args: &Args,
    config: &NodeConfig,
    source: TraceFileSource,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let destination = config.destination_addr();
    if !args.quiet {
        eprintln!(
            "{} camnet sender: nodeId={} -> {} every {}ms",
            ">>>".green().bold(),
            config.node_id,
            destination,
            config.interval_ms
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    }

    let socket = camnet::transport::broadcast_socket()?;
    let sender = CamSender::spawn(
        CamMessage::new(config.node_id),
        Box::new(source),
        socket,
        destination,
        config.interval(),
        stop,
    )?;
    let sent = sender.join();

    eprintln!(
        "\n{} {} beacon(s) sent to {}",
        "---".dimmed(),
        sent,
        destination
    );
    Ok(())
}

fn run_recv_only(
    args: &Args,
    config: &NodeConfig,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = camnet::transport::listener_socket(config.port, config.recv_timeout())?;
    let local = listener.local_addr()?;
    if !args.quiet {
        eprintln!(
            "{} camnet receiver: listening on {} (filter: {:?})",
            ">>>".green().bold(),
            local,
            config.filter
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    }

    let filter = SelfFilter::from_policy(config.filter, config.node_id)?;
    let receiver = CamReceiver::spawn(
        listener,
        Some(filter),
        beacon_printer(args.quiet),
        Arc::clone(&stop),
    )?;

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    let metrics = Arc::clone(&receiver.metrics);
    receiver.shutdown();

    let (received, accepted, filtered, malformed, _bytes, _handler_errors) = metrics.snapshot();
    eprintln!(
        "\n{} {} datagram(s) received: {} accepted, {} filtered, {} malformed",
        "---".dimmed(),
        received,
        accepted,
        filtered,
        malformed
    );
    Ok(())
}

fn print_summary(summary: &NodeSummary) {
    eprintln!(
        "\n{} {} beacon(s) sent, {} accepted, {} filtered, {} malformed",
        "---".dimmed(),
        summary.beacons_sent,
        summary.beacons_accepted,
        summary.beacons_filtered,
        summary.packets_malformed
    );
}
