//! An established call: re-INVITEs renegotiate media in place, UPDATE
//! refreshes the session timer, BYE tears the call down.
//!
//! Grounded on `original_source/src/sip/states/ActiveState.cpp`. Resolves
//! two points the original left incomplete (see `SPEC_FULL.md` §9): a
//! re-INVITE reuses `config.effective_bind_ip()` consistently (the original
//! mixes `bindIp` and `getEffectiveBindIp()` between the negotiate and
//! Contact-header calls), and UPDATE echoes `Session-Expires` unmodified
//! with 200 OK rather than being a bare acknowledgement — this gateway never
//! requires the timer extension, so there is no 422 case to produce.

use crate::session::{CallSession, Core};
use crate::state::CallStateHandler;
use gateway_sip::constants::status;
use gateway_sip::SipMessage;
use std::net::SocketAddr;

pub struct ActiveState;

impl CallStateHandler for ActiveState {
    fn name(&self) -> &'static str {
        "Active"
    }

    fn handle_invite(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received re-INVITE in Active state");
        let config = core.deps.config.clone();

        // Glare: this gateway has its own UAC INVITE (BYE/REFER never count,
        // only an outstanding re-INVITE this side originated) outstanding
        // against the same dialog. The original left this check commented
        // out; spec.md §4.H requires it.
        if session.has_pending_uac_invite() {
            core.respond(req, status::REQUEST_PENDING.0, status::REQUEST_PENDING.1, sender);
            return;
        }

        core.respond(req, status::TRYING.0, status::TRYING.1, sender);

        if req.body.is_empty() {
            core.respond(req, status::BAD_REQUEST.0, "No SDP", sender);
            return;
        }
        let offer_body = String::from_utf8_lossy(&req.body).to_string();
        let offer = gateway_sdp::parse(&offer_body);

        let Some(local_port) = session.local_port() else {
            core.respond(req, status::INTERNAL_SERVER_ERROR.0, status::INTERNAL_SERVER_ERROR.1, sender);
            return;
        };

        let codec = match gateway_sdp::negotiate(&offer, &config.codec_preference) {
            Ok(codec) => codec,
            Err(err) => {
                tracing::warn!(call_id = session.call_id(), %err, "re-INVITE offered no common codec");
                core.respond(req, status::NOT_ACCEPTABLE.0, "Not Acceptable", sender);
                return;
            }
        };
        let sdp_answer = gateway_sdp::render_answer(config.effective_bind_ip(), local_port, &codec);

        let remote_ip = offer.connection_ip.clone().unwrap_or_default();
        let remote_port = offer.audio_media().map(|m| m.port).unwrap_or(0);
        session.set_remote_media(&remote_ip, remote_port);

        core.respond_with_body(
            req,
            status::OK.0,
            status::OK.1,
            sdp_answer.into_bytes(),
            Some("application/sdp"),
            &[(
                "Contact",
                format!("<sip:{}:{}>", config.effective_bind_ip(), config.sip_port),
            )],
            sender,
        );
    }

    fn handle_ack(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "received ACK in Active state");
        session.confirm_dialog();
    }

    fn handle_bye(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received BYE in Active state");
        core.respond(req, status::OK.0, status::OK.1, sender);
        session.terminate();
        session.set_kind(crate::state::CallStateKind::Terminated);
    }

    fn handle_cancel(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        let _ = session;
        core.respond(req, status::OK.0, status::OK.1, sender);
    }

    fn handle_update(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        tracing::info!(call_id = session.call_id(), "received UPDATE in Active state");
        let session_expires = req.headers.get("Session-Expires").map(str::to_string);
        let extra: Vec<(&str, String)> = session_expires
            .map(|v| vec![("Session-Expires", v)])
            .unwrap_or_default();
        core.respond_with_body(req, status::OK.0, status::OK.1, Vec::new(), None, &extra, sender);
    }

    fn handle_options(&self, session: &CallSession, core: &mut Core, req: &SipMessage, sender: SocketAddr) {
        let _ = session;
        core.respond(req, status::OK.0, status::OK.1, sender);
    }

    fn handle_error(&self, session: &CallSession, _core: &mut Core, _req: &SipMessage, _sender: SocketAddr) {
        tracing::debug!(call_id = session.call_id(), "protocol error in Active state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::registry::CallRegistry;
    use crate::session::Deps;
    use crate::transport::SipTransport;
    use gateway_rtp::RtpWorkerPool;
    use gateway_sip::constants::Method;
    use gateway_sip::TransactionManager;
    use parking_lot::Mutex;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<SipMessage>>,
    }
    impl SipTransport for RecordingTransport {
        fn send(&self, msg: &SipMessage, _dest: SocketAddr) {
            self.sent.lock().push(msg.clone());
        }
    }

    fn deps(transport: Arc<RecordingTransport>) -> Deps {
        Deps {
            config: Arc::new(GatewayConfig::default()),
            registry: Arc::new(CallRegistry::new()),
            rtp: Arc::new(RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 38000, 38010, 1).unwrap()),
            transactions: Arc::new(TransactionManager::new()),
            transport,
        }
    }

    #[test]
    fn re_invite_with_pending_uac_invite_gets_491() {
        let transport = Arc::new(RecordingTransport::default());
        let deps = deps(transport.clone());
        let session = CallSession::new("c1".to_string(), deps.clone());
        session.set_pending_uac_invite(true);

        let mut req = SipMessage::new_request("INVITE", "sip:bob@127.0.0.1");
        req.headers.append("Via", "SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK1");
        req.headers.append("Call-ID", "c1");
        req.headers.append("CSeq", "2 INVITE");
        req.body = b"v=0\r\n".to_vec();

        let mut core = Core {
            deps,
            branch: "z9hG4bK1".to_string(),
            method: Method::Invite,
        };
        ActiveState.handle_invite(&session, &mut core, &req, "10.0.0.1:5060".parse().unwrap());

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status_code(), Some(491));
    }
}
