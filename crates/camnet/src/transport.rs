// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP socket construction for beacon exchange.
//!
//! Each node runs two sockets: an unbound broadcast-capable sender socket
//! and a bound listener socket with a read timeout. Each loop owns its
//! socket exclusively and closes it on exit.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Outbound beacon socket: ephemeral port, SO_BROADCAST enabled.
///
/// Unicast destinations work over the same socket; the broadcast option
/// only widens what the kernel accepts as a destination.
pub fn broadcast_socket() -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;

    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket.into();
    log::debug!("[UDP] broadcast socket bound to {}", socket.local_addr()?);
    Ok(socket)
}

/// Inbound beacon socket: bound on all interfaces with a read timeout.
///
/// Port 0 requests an OS-assigned port (loopback testing); read the
/// effective port back with `local_addr()`. The timeout bounds how long a
/// blocking read can keep the receive loop from polling its stop flag, so
/// it must not be zero.
pub fn listener_socket(port: u16, read_timeout: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(read_timeout))?;
    log::debug!(
        "[UDP] listener socket bound to {} (read timeout {:?})",
        socket.local_addr()?,
        read_timeout
    );
    Ok(socket)
}

/// Addresses this host answers to, for the source-address self-filter.
///
/// Interface enumeration plus IPv4 loopback, which single-host deployments
/// beacon over.
pub fn local_addresses() -> io::Result<Vec<IpAddr>> {
    let interfaces = local_ip_address::list_afinet_netifas()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let mut addrs: Vec<IpAddr> = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
    for (name, ip) in interfaces {
        if ip.is_loopback() || addrs.contains(&ip) {
            continue;
        }
        log::debug!("[UDP] local address {} ({})", ip, name);
        addrs.push(ip);
    }
    Ok(addrs)
}
