//! Process-wide call index: by Call-ID and by local RTP port.
//!
//! Grounded on `original_source/src/call/CallRegistry.cpp`.

use crate::session::CallSession;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    calls: HashMap<String, Arc<CallSession>>,
    port_to_call: HashMap<u16, String>,
    call_to_ports: HashMap<String, Vec<u16>>,
}

/// Dual-indexed, mutex-guarded call table (§4.G).
#[derive(Default)]
pub struct CallRegistry {
    inner: Mutex<Inner>,
}

impl CallRegistry {
    pub fn new() -> Self {
        CallRegistry::default()
    }

    /// Inserts `session` under `call_id`. Returns `false` if a call with
    /// that Call-ID already exists (mirrors `CallRegistry::addCall`).
    pub fn add_call(&self, call_id: String, session: Arc<CallSession>) -> bool {
        let mut inner = self.inner.lock();
        if inner.calls.contains_key(&call_id) {
            return false;
        }
        inner.calls.insert(call_id, session);
        true
    }

    pub fn get_call(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.inner.lock().calls.get(call_id).cloned()
    }

    /// Removes `call_id` and every RTP port it registered. Does not itself
    /// release the ports back to the RTP pool — that's `CallSession`'s job,
    /// since only it holds the pool handle.
    pub fn remove_call(&self, call_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(ports) = inner.call_to_ports.remove(call_id) {
            for port in ports {
                inner.port_to_call.remove(&port);
            }
        }
        inner.calls.remove(call_id);
    }

    pub fn register_rtp_port(&self, port: u16, call_id: String) {
        let mut inner = self.inner.lock();
        inner.port_to_call.insert(port, call_id.clone());
        inner.call_to_ports.entry(call_id).or_default().push(port);
    }

    pub fn get_call_by_port(&self, port: u16) -> Option<Arc<CallSession>> {
        let inner = self.inner.lock();
        let call_id = inner.port_to_call.get(&port)?;
        inner.calls.get(call_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn get_all_call_ids(&self) -> Vec<String> {
        self.inner.lock().calls.keys().cloned().collect()
    }

    /// Snapshot of every live session, for work that must touch all calls
    /// (e.g. the jitter buffers' flush-on-idle sweep).
    pub fn get_all_sessions(&self) -> Vec<Arc<CallSession>> {
        self.inner.lock().calls.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::session::Deps;
    use crate::transport::SipTransport;
    use gateway_rtp::RtpWorkerPool;
    use gateway_sip::{SipMessage, TransactionManager};
    use std::net::{Ipv4Addr, SocketAddr};

    struct NullTransport;
    impl SipTransport for NullTransport {
        fn send(&self, _msg: &SipMessage, _dest: SocketAddr) {}
    }

    fn deps() -> Deps {
        Deps {
            config: Arc::new(GatewayConfig::default()),
            registry: Arc::new(CallRegistry::new()),
            rtp: Arc::new(RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 31000, 31010, 1).unwrap()),
            transactions: Arc::new(TransactionManager::new()),
            transport: Arc::new(NullTransport),
        }
    }

    #[test]
    fn duplicate_call_id_insert_is_rejected() {
        let registry = CallRegistry::new();
        let session = CallSession::new("c1".to_string(), deps());
        assert!(registry.add_call("c1".to_string(), Arc::clone(&session)));
        assert!(!registry.add_call("c1".to_string(), session));
    }

    #[test]
    fn port_lookup_follows_call_removal() {
        let registry = CallRegistry::new();
        let session = CallSession::new("c1".to_string(), deps());
        registry.add_call("c1".to_string(), Arc::clone(&session));
        registry.register_rtp_port(30000, "c1".to_string());
        assert!(registry.get_call_by_port(30000).is_some());
        registry.remove_call("c1");
        assert!(registry.get_call_by_port(30000).is_none());
        assert_eq!(registry.count(), 0);
    }
}
