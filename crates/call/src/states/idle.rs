//! A call before any INVITE has been accepted.
//!
//! Grounded on `original_source/src/sip/states/IdleState.cpp`: the full
//! allocate-negotiate-start-pipeline ladder, each failure mapped to its own
//! final response. Differs from the original in one way: the call is only
//! registered (`registry.add_call`) once every step succeeds, not the
//! instant an INVITE with a fresh Call-ID arrives — a rejected offer never
//! shows up in `list`/port lookups.

use crate::session::{CallSession, Core};
use crate::state::CallStateHandler;
use gateway_sip::constants::status;
use gateway_sip::SipDialog;
use std::net::SocketAddr;

pub struct IdleState;

impl CallStateHandler for IdleState {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn handle_invite(&self, session: &CallSession, core: &mut Core, req: &gateway_sip::SipMessage, sender: SocketAddr) {
        let config = core.deps.config.clone();

        if core.deps.registry.count() >= config.max_calls {
            tracing::warn!(call_id = session.call_id(), "max calls reached, rejecting INVITE");
            core.respond(req, status::BUSY_HERE.0, status::BUSY_HERE.1, sender);
            session.set_kind(crate::state::CallStateKind::Terminated);
            return;
        }

        session.set_remote_sip_addr(sender);
        if let Some(from) = req.headers.get("From") {
            if let Some(to) = req.headers.get("To") {
                session.set_users(
                    gateway_sip::extract_user(from).unwrap_or_default().to_string(),
                    gateway_sip::extract_user(to).unwrap_or_default().to_string(),
                );
            }
        }

        core.respond(req, status::TRYING.0, status::TRYING.1, sender);
        session.set_kind(crate::state::CallStateKind::Proceeding);
        session.set_last_invite(req.clone(), sender);

        if req.body.is_empty() {
            tracing::error!(call_id = session.call_id(), "no SDP in INVITE");
            core.respond(req, status::BAD_REQUEST.0, "Bad Request (No SDP)", sender);
            session.set_kind(crate::state::CallStateKind::Terminated);
            return;
        }
        let offer_body = String::from_utf8_lossy(&req.body).to_string();
        let offer = gateway_sdp::parse(&offer_body);

        let local_port = match session.allocate_port() {
            Ok(port) => port,
            Err(err) => {
                tracing::error!(call_id = session.call_id(), %err, "failed to allocate RTP port");
                core.respond(req, status::INTERNAL_SERVER_ERROR.0, status::INTERNAL_SERVER_ERROR.1, sender);
                session.set_kind(crate::state::CallStateKind::Terminated);
                return;
            }
        };
        tracing::debug!(call_id = session.call_id(), local_port, "allocated RTP port");

        let codec = match gateway_sdp::negotiate(&offer, &config.codec_preference) {
            Ok(codec) => codec,
            Err(err) => {
                tracing::error!(call_id = session.call_id(), %err, "no common codec");
                session.release_port();
                core.respond(req, status::NOT_ACCEPTABLE.0, status::NOT_ACCEPTABLE.1, sender);
                session.set_kind(crate::state::CallStateKind::Terminated);
                return;
            }
        };
        let sdp_answer = gateway_sdp::render_answer(config.effective_bind_ip(), local_port, &codec);

        let remote_ip = offer.connection_ip.clone().unwrap_or_default();
        let remote_port = offer.audio_media().map(|m| m.port).unwrap_or(0);
        session.set_remote_media(&remote_ip, remote_port);

        if let Err(err) = session.start_pipeline(codec.payload_type) {
            tracing::error!(call_id = session.call_id(), %err, "failed to start media pipeline");
            session.release_port();
            core.respond(
                req,
                status::SERVICE_UNAVAILABLE.0,
                "Service Unavailable (Backend Connection Failed)",
                sender,
            );
            session.set_kind(crate::state::CallStateKind::Terminated);
            return;
        }

        let mut res = gateway_sip::create_response(req, status::OK.0, status::OK.1);
        res.headers.set("Content-Type", "application/sdp");
        res.headers.set(
            "Contact",
            format!("<sip:{}:{}>", config.effective_bind_ip(), config.sip_port),
        );
        res.body = sdp_answer.into_bytes();

        let to_tag = gateway_sip::response::to_tag(&res).unwrap_or_default().to_string();
        session.set_dialog(SipDialog::from_invite(req, to_tag));

        core.send_prebuilt(req, &res, sender);

        let call_id = session.call_id().to_string();
        core.deps.registry.register_rtp_port(local_port, call_id.clone());
        core.deps.registry.add_call(call_id, session.self_arc());

        session.set_kind(crate::state::CallStateKind::Active);
    }

    fn handle_ack(&self, session: &CallSession, _core: &mut Core, _req: &gateway_sip::SipMessage, _sender: SocketAddr) {
        tracing::warn!(call_id = session.call_id(), "received ACK in Idle state, ignoring");
    }

    fn handle_bye(&self, session: &CallSession, core: &mut Core, req: &gateway_sip::SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received BYE in Idle state, terminating");
        core.respond(req, status::OK.0, status::OK.1, sender);
        session.terminate();
        session.set_kind(crate::state::CallStateKind::Terminated);
    }

    fn handle_cancel(&self, session: &CallSession, core: &mut Core, req: &gateway_sip::SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received CANCEL in Idle state");
        core.respond(req, status::OK.0, status::OK.1, sender);
        session.set_kind(crate::state::CallStateKind::Terminated);
    }

    fn handle_update(&self, session: &CallSession, core: &mut Core, req: &gateway_sip::SipMessage, sender: SocketAddr) {
        tracing::warn!(call_id = session.call_id(), "received UPDATE in Idle state");
        core.respond(req, status::NOT_IMPLEMENTED.0, status::NOT_IMPLEMENTED.1, sender);
    }

    fn handle_options(&self, session: &CallSession, core: &mut Core, req: &gateway_sip::SipMessage, sender: SocketAddr) {
        let _ = session;
        core.respond(req, status::OK.0, status::OK.1, sender);
    }

    fn handle_error(&self, session: &CallSession, _core: &mut Core, _req: &gateway_sip::SipMessage, _sender: SocketAddr) {
        tracing::error!(call_id = session.call_id(), "protocol error in Idle state");
    }
}
