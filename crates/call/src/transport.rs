//! Outbound SIP delivery, injected so `CallSession` never owns a raw socket.
//!
//! `original_source/src/sip/SipServer.h` bundles socket ownership and
//! send/receive into one class; splitting delivery into a trait lets
//! `gateway-app` own the actual UDP socket while this crate stays
//! transport-agnostic and unit-testable.

use gateway_sip::SipMessage;
use std::net::SocketAddr;

pub trait SipTransport: Send + Sync {
    fn send(&self, msg: &SipMessage, dest: SocketAddr);
}
