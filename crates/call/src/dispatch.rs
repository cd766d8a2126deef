//! Top-level SIP request router: stateless methods, transaction admission,
//! session lookup/creation, and handing admitted requests to the current
//! state's handler.
//!
//! Grounded on `original_source/src/app/GatewayApp.cpp::handleSipMessage`.

use crate::session::{CallSession, Core, Deps};
use crate::state::CallStateKind;
use gateway_sip::constants::status;
use gateway_sip::{Admission, Method, SipMessage};
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Dispatcher {
    deps: Deps,
}

impl Dispatcher {
    pub fn new(deps: Deps) -> Self {
        Dispatcher { deps }
    }

    /// Routes one inbound SIP request. Malformed datagrams never reach
    /// here — `SipMessage::parse` already rejected them upstream.
    pub fn handle_request(&self, req: &SipMessage, sender: SocketAddr) {
        let Some(method_token) = req.method_token() else {
            tracing::debug!("dropping SIP response received on the request path");
            return;
        };
        let Some(method) = Method::parse(method_token) else {
            tracing::warn!(%method_token, "unrecognised SIP method");
            return;
        };

        // REGISTER is never tied to a call: acknowledge and stop.
        if method == Method::Register {
            let mut res = gateway_sip::create_response(req, status::OK.0, status::OK.1);
            res.headers.set("Expires", "3600");
            self.deps.transport.send(&res, sender);
            return;
        }

        let call_id = req.call_id().unwrap_or_default().to_string();
        let existing = self.deps.registry.get_call(&call_id);

        // Out-of-dialog OPTIONS (no session yet) is answered statelessly;
        // once a session exists it flows through the normal state machine,
        // whose every state also replies 200 OK to OPTIONS.
        if method == Method::Options && existing.is_none() {
            let res = gateway_sip::create_response(req, status::OK.0, status::OK.1);
            self.deps.transport.send(&res, sender);
            return;
        }

        let branch = req.top_via_branch().unwrap_or_default().to_string();

        match self.deps.transactions.admit_request(&call_id, &branch, method) {
            Admission::Retransmit(cached) => {
                tracing::debug!(call_id = %call_id, %method, "retransmission, replaying cached response");
                self.deps.transport.send(&cached, sender);
                return;
            }
            Admission::AckAccepted => {
                tracing::debug!(call_id = %call_id, "ACK accepted by transaction layer, no handler dispatch");
                return;
            }
            Admission::New => {}
        }

        let session = match existing {
            Some(session) => session,
            None => {
                if method != Method::Invite {
                    if method != Method::Ack {
                        let mut core = Core {
                            deps: self.deps.clone(),
                            branch,
                            method,
                        };
                        core.respond(req, status::CALL_DOES_NOT_EXIST.0, status::CALL_DOES_NOT_EXIST.1, sender);
                    }
                    return;
                }
                CallSession::new(call_id.clone(), self.deps.clone())
            }
        };

        self.dispatch_to_state(&session, method, branch, req, sender);
    }

    fn dispatch_to_state(&self, session: &Arc<CallSession>, method: Method, branch: String, req: &SipMessage, sender: SocketAddr) {
        let mut core = Core {
            deps: self.deps.clone(),
            branch,
            method,
        };
        let handler = session.kind().handler();

        match method {
            Method::Invite => handler.handle_invite(session, &mut core, req, sender),
            Method::Ack => handler.handle_ack(session, &mut core, req, sender),
            Method::Bye => handler.handle_bye(session, &mut core, req, sender),
            Method::Cancel => handler.handle_cancel(session, &mut core, req, sender),
            Method::Update => handler.handle_update(session, &mut core, req, sender),
            Method::Options => handler.handle_options(session, &mut core, req, sender),
            Method::Refer | Method::Register => handler.handle_error(session, &mut core, req, sender),
        }
    }

    /// Called once per poll-loop tick outside any single message's dispatch:
    /// sweeps expired transactions. Grounded on `GatewayApp.cpp`'s
    /// throttled `cleanupTransactions()`.
    pub fn sweep_transactions(&self) {
        self.deps.transactions.sweep();
    }

    /// Called every poll-loop tick (§9's "per-call drain timer"): gives
    /// every live call's jitter buffer a chance to flush a stranded tail
    /// once its stream has gone idle, independent of new RTP arrivals.
    pub fn drain_idle_jitter_buffers(&self) {
        for session in self.deps.registry.get_all_sessions() {
            session.drain_idle();
        }
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    /// For the CLI `cut <call-id>` command and graceful shutdown: terminates
    /// one call by id if it's registered.
    pub fn cut_call(&self, call_id: &str) -> bool {
        match self.deps.registry.get_call(call_id) {
            Some(session) => {
                session.set_kind(CallStateKind::Terminated);
                session.terminate();
                true
            }
            None => false,
        }
    }

    /// Terminates every registered call, used on shutdown.
    pub fn terminate_all(&self) {
        for call_id in self.deps.registry.get_all_call_ids() {
            self.cut_call(&call_id);
        }
    }
}
