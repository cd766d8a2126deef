//! Socket creation helpers shared by the worker pool.
//!
//! Grounded on `original_source/src/util/Net.cpp`, re-expressed over
//! `socket2` so binding, non-blocking mode and reuse options are set
//! explicitly rather than relying on `std::net::UdpSocket`'s defaults.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Creates, binds and sets non-blocking a UDP socket on `bind_ip:port`.
pub fn bind_udp(bind_ip: Ipv4Addr, port: u16) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    let addr: SocketAddr = SocketAddrV4::new(bind_ip, port).into();
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
