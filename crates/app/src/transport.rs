//! The concrete UDP socket this binary's SIP poll loop reads from and the
//! [`gateway_call::SipTransport`] impl it hands to the call state machine
//! for outbound sends.
//!
//! Grounded on `original_source/src/sip/SipServer.cpp` and
//! `original_source/src/util/Net.cpp`: a bound, reusable UDP socket with a
//! bounded wait for the next datagram rather than a busy poll.

use gateway_call::SipTransport;
use gateway_sip::SipMessage;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

pub struct UdpSipTransport {
    socket: UdpSocket,
}

impl UdpSipTransport {
    pub fn bind(bind_ip: Ipv4Addr, port: u16, poll_timeout: Duration) -> std::io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let addr: SocketAddr = SocketAddrV4::new(bind_ip, port).into();
        socket.bind(&addr.into())?;
        socket.set_read_timeout(Some(poll_timeout))?;
        tracing::info!(%addr, "SIP socket bound");
        Ok(UdpSipTransport { socket: socket.into() })
    }

    /// Waits up to the configured poll timeout for one datagram. Returns
    /// `None` on timeout or a transient recv error, never on real failure:
    /// a malformed or empty UDP datagram is the caller's problem, not this
    /// transport's.
    pub fn recv(&self, buf: &mut [u8]) -> Option<(usize, SocketAddr)> {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => Some((n, from)),
            Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => None,
            Err(err) => {
                tracing::debug!(%err, "SIP recv error");
                None
            }
        }
    }
}

impl SipTransport for UdpSipTransport {
    fn send(&self, msg: &SipMessage, dest: SocketAddr) {
        let bytes = msg.serialize();
        if let Err(err) = self.socket.send_to(&bytes, dest) {
            tracing::warn!(%dest, %err, "failed to send SIP message");
        }
    }
}
