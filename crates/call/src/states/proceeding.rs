//! The brief window between a 100 Trying and the INVITE's final response.
//!
//! Grounded on `original_source/src/sip/states/ProceedingState.cpp`, with one
//! gap closed (§9 Open Question ii): the original sends only a 200 OK to
//! CANCEL and admits it never gets around to the 487 on the original INVITE
//! transaction ("In full implementation we would... For now, Terminate.").
//! Here `handle_cancel` does both: 200 OK to the CANCEL itself, and 487
//! Request Terminated replayed onto the INVITE transaction the session
//! stashed in `last_invite` when it sent 100 Trying.

use crate::session::{CallSession, Core};
use crate::state::CallStateHandler;
use gateway_sip::constants::status;
use gateway_sip::{Method, SipMessage};
use std::net::SocketAddr;

pub struct ProceedingState;

impl CallStateHandler for ProceedingState {
    fn name(&self) -> &'static str {
        "Proceeding"
    }

    fn handle_invite(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "received INVITE retransmission in Proceeding state");
    }

    fn handle_ack(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        let _ = session;
    }

    fn handle_bye(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        core.respond(req, status::OK.0, status::OK.1, sender);
        session.terminate();
        session.set_kind(crate::state::CallStateKind::Terminated);
    }

    fn handle_cancel(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received CANCEL in Proceeding state");
        core.respond(req, status::OK.0, status::OK.1, sender);

        if let Some((invite, invite_sender)) = session.last_invite() {
            let res = gateway_sip::create_response(&invite, status::REQUEST_TERMINATED.0, status::REQUEST_TERMINATED.1);
            core.deps.transport.send(&res, invite_sender);
            let call_id = invite.call_id().unwrap_or_default().to_string();
            core.deps
                .transactions
                .on_response_sent(&call_id, &core.branch, Method::Invite, status::REQUEST_TERMINATED.0, &res);
        }

        session.terminate();
        session.set_kind(crate::state::CallStateKind::Terminated);
    }

    fn handle_update(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        let _ = session;
    }

    fn handle_options(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        let _ = session;
        core.respond(req, status::OK.0, status::OK.1, sender);
    }

    fn handle_error(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        let _ = session;
    }
}
