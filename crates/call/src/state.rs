//! The call state machine's handler trait and its four variants.
//!
//! Grounded on `original_source/src/sip/CallState.h`: the original dispatches
//! through a virtual base class and `shared_ptr<CallState>` held by the
//! session. A Rust trait plus a plain `Copy` enum gets the same open set of
//! per-state behavior without needing a session to own a boxed trait
//! object — `CallStateKind::handler()` hands back a `&'static dyn
//! CallStateHandler` for one of four zero-sized marker structs.

use crate::session::{CallSession, Core};
use crate::states::{active::ActiveState, idle::IdleState, proceeding::ProceedingState, terminated::TerminatedState};
use gateway_sip::SipMessage;
use std::net::SocketAddr;

/// Per-call lifecycle state (§4.H). `Proceeding` is transient: this gateway
/// answers INVITE synchronously within one dispatch, so nothing outside the
/// handler that sets it can observe it before it's superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStateKind {
    Idle,
    Proceeding,
    Active,
    Terminated,
}

impl CallStateKind {
    pub fn handler(self) -> &'static dyn CallStateHandler {
        match self {
            CallStateKind::Idle => &IdleState,
            CallStateKind::Proceeding => &ProceedingState,
            CallStateKind::Active => &ActiveState,
            CallStateKind::Terminated => &TerminatedState,
        }
    }

    pub fn name(self) -> &'static str {
        self.handler().name()
    }
}

/// The handler set every state must implement, matching §4.H's explicit
/// requirement that the state machine be "polymorphic over
/// `{handleInvite, handleAck, handleBye, handleCancel, handleUpdate,
/// handleOptions, handleError}`".
pub trait CallStateHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle_invite(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_ack(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_bye(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_cancel(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_update(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_options(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
    fn handle_error(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr);
}
