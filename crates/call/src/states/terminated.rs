//! Terminal state: every handler is a no-op, matching
//! `original_source/src/sip/states/TerminatedState.cpp`.

use crate::session::{CallSession, Core};
use crate::state::CallStateHandler;
use gateway_sip::SipMessage;
use std::net::SocketAddr;

pub struct TerminatedState;

impl CallStateHandler for TerminatedState {
    fn name(&self) -> &'static str {
        "Terminated"
    }

    fn handle_invite(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored INVITE in Terminated state");
    }

    fn handle_ack(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored ACK in Terminated state");
    }

    fn handle_bye(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored BYE in Terminated state");
    }

    fn handle_cancel(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored CANCEL in Terminated state");
    }

    fn handle_update(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored UPDATE in Terminated state");
    }

    fn handle_options(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored OPTIONS in Terminated state");
    }

    fn handle_error(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "ignored error in Terminated state");
    }
}
