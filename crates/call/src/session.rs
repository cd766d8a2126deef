//! Per-call session state and the process-wide service handles it needs.
//!
//! Grounded on `original_source/src/call/CallSession.h`/`.cpp`: one mutex
//! guards everything the RTP and SIP sides touch concurrently (§5), and the
//! heavy work — pipeline processing, the actual socket send — happens
//! after snapshotting what's needed and dropping the lock.

use crate::config::{GatewayConfig, GatewayMode};
use crate::error::{Error, Result};
use crate::registry::CallRegistry;
use crate::state::CallStateKind;
use crate::transport::SipTransport;
use gateway_media::{BackendStage, EchoStage, MediaPipeline, RecorderStage};
use gateway_rtp::{JitterBuffer, RtpPacket, RtpWorkerPool};
use gateway_sip::{SipDialog, SipMessage, TransactionManager};
use parking_lot::Mutex;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

/// Process-wide service handles every call session needs: configuration,
/// the call registry, the RTP port pool, the transaction table, and the
/// outbound SIP transport. Cloned (cheaply, it's all `Arc`s) into every
/// [`CallSession`] and every [`crate::state::Core`].
#[derive(Clone)]
pub struct Deps {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<CallRegistry>,
    pub rtp: Arc<RtpWorkerPool>,
    pub transactions: Arc<TransactionManager>,
    pub transport: Arc<dyn SipTransport>,
}

/// Per-message context threaded through the state machine's handlers: the
/// process-wide service handles plus this request's transaction identity,
/// so a handler's response can be both sent and cached for retransmits in
/// one call (§9's "response sender capability").
pub struct Core {
    pub deps: Deps,
    pub branch: String,
    pub method: gateway_sip::constants::Method,
}

impl Core {
    /// Builds a response correlated to `req`, sends it to `dest`, and
    /// records it with the transaction layer so a retransmitted request
    /// gets the identical bytes back without re-running any side effects.
    pub fn respond(&mut self, req: &SipMessage, code: u16, reason: &str, dest: SocketAddr) {
        self.respond_with_body(req, code, reason, Vec::new(), None, &[], dest)
    }

    /// Same as [`Core::respond`] but attaches a body (and, when `content_type`
    /// is set, a `Content-Type` header) plus any extra headers.
    pub fn respond_with_body(
        &mut self,
        req: &SipMessage,
        code: u16,
        reason: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
        extra_headers: &[(&str, String)],
        dest: SocketAddr,
    ) {
        let mut res = gateway_sip::create_response(req, code, reason);
        for (name, value) in extra_headers {
            res.headers.set(*name, value.clone());
        }
        if let Some(ct) = content_type {
            res.headers.set("Content-Type", ct);
        }
        if !body.is_empty() {
            res.body = body;
            res.headers.set("Content-Length", res.body.len().to_string());
        }
        self.send_prebuilt(req, &res, dest);
    }

    /// Sends an already-built response verbatim and records it with the
    /// transaction layer. Needed whenever the caller must inspect the
    /// response before it goes out — e.g. reading the auto-generated `To`
    /// tag to seed a new dialog (§6's "dialog initialized before the 200 OK
    /// that established it is sent").
    pub fn send_prebuilt(&mut self, req: &SipMessage, res: &SipMessage, dest: SocketAddr) {
        self.deps.transport.send(res, dest);
        let call_id = req.call_id().unwrap_or_default().to_string();
        let code = res.status_code().unwrap_or(0);
        self.deps
            .transactions
            .on_response_sent(&call_id, &self.branch, self.method, code, res);
    }
}

/// Fields guarded by the session's single mutex (§5): everything the SIP
/// side and the RTP side can both touch.
struct Inner {
    kind: CallStateKind,
    from_user: String,
    to_user: String,
    remote_sip_addr: Option<SocketAddr>,
    local_rtp_port: Option<u16>,
    remote_rtp_addr: Option<SocketAddr>,
    rtp_locked: bool,
    payload_type: u8,
    ssrc: u32,
    outgoing_seq: u16,
    outgoing_ts: u32,
    dialog: Option<SipDialog>,
    pipeline: Option<MediaPipeline>,
    jitter: JitterBuffer,
    last_invite: Option<(SipMessage, SocketAddr)>,
    pending_uac_invite: bool,
}

impl Inner {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        let ssrc: u32 = rng.gen();
        Inner {
            kind: CallStateKind::Idle,
            from_user: String::new(),
            to_user: String::new(),
            remote_sip_addr: None,
            local_rtp_port: None,
            remote_rtp_addr: None,
            rtp_locked: false,
            payload_type: 0,
            ssrc,
            outgoing_seq: (ssrc & 0xFFFF) as u16,
            outgoing_ts: ssrc,
            dialog: None,
            pipeline: None,
            jitter: JitterBuffer::new(),
            last_invite: None,
            pending_uac_invite: false,
        }
    }
}

/// One inbound call: SIP dialog state, the RTP side's symmetric-lock and
/// jitter buffer, and the media pipeline bridging it to echo/backend.
///
/// Grounded on `original_source/src/call/CallSession.h`.
pub struct CallSession {
    call_id: String,
    deps: Deps,
    inner: Mutex<Inner>,
    self_weak: Weak<CallSession>,
}

impl CallSession {
    pub fn new(call_id: String, deps: Deps) -> Arc<Self> {
        Arc::new_cyclic(|weak| CallSession {
            call_id,
            deps,
            inner: Mutex::new(Inner::new()),
            self_weak: weak.clone(),
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Recovers the `Arc` this session lives behind, for handlers (e.g.
    /// `IdleState::handle_invite` on success) that need to hand it to
    /// `CallRegistry::add_call` without threading an extra parameter
    /// through every `CallStateHandler` method.
    pub fn self_arc(&self) -> Arc<CallSession> {
        self.self_weak.upgrade().expect("session outlives its own Arc")
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    pub fn kind(&self) -> CallStateKind {
        self.inner.lock().kind
    }

    pub fn set_kind(&self, kind: CallStateKind) {
        self.inner.lock().kind = kind;
    }

    pub fn set_users(&self, from_user: String, to_user: String) {
        let mut inner = self.inner.lock();
        inner.from_user = from_user;
        inner.to_user = to_user;
    }

    pub fn from_user(&self) -> String {
        self.inner.lock().from_user.clone()
    }

    pub fn to_user(&self) -> String {
        self.inner.lock().to_user.clone()
    }

    pub fn set_remote_sip_addr(&self, addr: SocketAddr) {
        self.inner.lock().remote_sip_addr = Some(addr);
    }

    pub fn remote_sip_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().remote_sip_addr
    }

    pub fn set_last_invite(&self, req: SipMessage, sender: SocketAddr) {
        self.inner.lock().last_invite = Some((req, sender));
    }

    pub fn last_invite(&self) -> Option<(SipMessage, SocketAddr)> {
        self.inner.lock().last_invite.clone()
    }

    pub fn set_dialog(&self, dialog: SipDialog) {
        self.inner.lock().dialog = Some(dialog);
    }

    pub fn confirm_dialog(&self) {
        if let Some(dialog) = self.inner.lock().dialog.as_mut() {
            dialog.confirm();
        }
    }

    pub fn set_pending_uac_invite(&self, pending: bool) {
        self.inner.lock().pending_uac_invite = pending;
    }

    pub fn has_pending_uac_invite(&self) -> bool {
        self.inner.lock().pending_uac_invite
    }

    pub fn local_port(&self) -> Option<u16> {
        self.inner.lock().local_rtp_port
    }

    pub fn payload_type(&self) -> u8 {
        self.inner.lock().payload_type
    }

    /// Allocates an RTP/RTCP port pair from the shared pool and records the
    /// RTP port on this session. Does not touch the registry's port index —
    /// that happens once the call is actually accepted (§8 invariant 1 only
    /// binds once a call is registered).
    pub fn allocate_port(&self) -> gateway_rtp::Result<u16> {
        let (rtp_port, _rtcp_port) = self.deps.rtp.allocate()?;
        self.inner.lock().local_rtp_port = Some(rtp_port);
        Ok(rtp_port)
    }

    /// Releases the session's RTP port back to the pool, idempotently —
    /// exactly once even if called twice (§8 invariant 2), since the second
    /// call finds `local_rtp_port` already `None`.
    pub fn release_port(&self) {
        let port = self.inner.lock().local_rtp_port.take();
        if let Some(port) = port {
            self.deps.rtp.release(port);
        }
    }

    pub fn set_remote_media(&self, ip: &str, port: u16) {
        if let Ok(addr) = format!("{ip}:{port}").parse() {
            self.inner.lock().remote_rtp_addr = Some(addr);
        }
    }

    /// Builds the media pipeline for a freshly negotiated codec: an
    /// echo or audio-socket backend stage, then always a recorder.
    /// Grounded on `original_source/src/call/CallSession.cpp::startPipeline`.
    pub fn start_pipeline(&self, payload_type: u8) -> Result<()> {
        let config = &self.deps.config;
        let mut pipeline = MediaPipeline::new();

        match config.mode {
            GatewayMode::Echo => pipeline.add_stage(Box::new(EchoStage::new())),
            GatewayMode::AudioSocket => {
                let from_user = self.from_user();
                let to_user = self.to_user();
                let stage = BackendStage::connect(
                    &config.audiosocket_target,
                    self.call_id.clone(),
                    &from_user,
                    &to_user,
                    payload_type,
                )
                .map_err(Error::Media)?;

                // Wire the cyclic session<->peer coupling (§9) through a
                // bare Weak handle rather than handing the peer an owning
                // reference back to its own session.
                let hangup_weak = self.self_weak.clone();
                stage.client().set_disconnect_callback(move || {
                    if let Some(session) = hangup_weak.upgrade() {
                        session.hangup();
                    }
                });
                let transfer_weak = self.self_weak.clone();
                stage.client().set_transfer_callback(move |uri| {
                    if let Some(session) = transfer_weak.upgrade() {
                        session.refer(uri);
                    }
                });

                pipeline.add_stage(Box::new(stage));
            }
        }

        // A recorder that fails to open its output file never fails the
        // call (§7): log it and run without recording.
        match RecorderStage::new(config.recording_mode, &config.recording_path, &self.call_id, payload_type) {
            Ok(recorder) => pipeline.add_stage(Box::new(recorder)),
            Err(err) => {
                tracing::error!(call_id = %self.call_id, %err, "failed to open recording file, continuing without recording");
            }
        }

        let mut inner = self.inner.lock();
        inner.payload_type = payload_type;
        inner.pipeline = Some(pipeline);
        Ok(())
    }

    /// Tears the call down: releases its RTP port, drops the pipeline
    /// (stopping the backend client and joining the recorder thread), and
    /// removes it from the registry.
    pub fn terminate(&self) {
        self.release_port();
        self.inner.lock().pipeline = None;
        self.deps.registry.remove_call(&self.call_id);
    }

    /// Driven by the audio-socket backend's disconnect callback (§4.J/§7):
    /// sends a BYE if the call is still `Active` (there is a dialog to tear
    /// down), then terminates locally either way.
    pub fn hangup(&self) {
        tracing::info!(call_id = %self.call_id, "audio-socket backend disconnected, hanging up");
        if self.kind() == CallStateKind::Active {
            self.send_in_dialog_request("BYE", &[]);
        }
        self.set_kind(CallStateKind::Terminated);
        self.terminate();
    }

    /// Driven by the audio-socket backend's transfer callback (§4.J): issues
    /// a REFER to `target_uri` on the established dialog. Fire-and-forget —
    /// this gateway does not track the REFER's own subscription/NOTIFY.
    pub fn refer(&self, target_uri: &str) {
        tracing::info!(call_id = %self.call_id, %target_uri, "audio-socket backend requested transfer");
        self.send_in_dialog_request("REFER", &[("Refer-To", target_uri.to_string())]);
    }

    /// Builds and sends a request this gateway originates in-dialog (BYE or
    /// REFER), using the tags and CSeq recorded in the dialog established
    /// when the call was answered. Not retried and not tracked by the
    /// transaction layer — this gateway only ever receives INVITEs, it never
    /// runs a UAC INVITE transaction of its own (see `gateway_sip::transaction`).
    fn send_in_dialog_request(&self, method: &str, extra_headers: &[(&str, String)]) {
        let (dest, call_id, local_tag, remote_tag, cseq) = {
            let mut inner = self.inner.lock();
            let Some(dest) = inner.remote_sip_addr else {
                return;
            };
            let Some(dialog) = inner.dialog.as_mut() else {
                return;
            };
            let cseq = dialog.next_local_cseq();
            (dest, dialog.call_id.clone(), dialog.local_tag.clone(), dialog.remote_tag.clone(), cseq)
        };

        let config = &self.deps.config;
        let from_user = self.from_user();
        let to_user = self.to_user();
        let bind_ip = config.effective_bind_ip();

        let request_uri = format!("sip:{from_user}@{}", dest.ip());
        let mut req = SipMessage::new_request(method, &request_uri);
        req.headers.append(
            "Via",
            format!(
                "SIP/2.0/UDP {bind_ip}:{};branch={}",
                config.sip_port,
                gateway_sip::tag::generate_branch()
            ),
        );
        req.headers
            .append("From", format!("<sip:{to_user}@{bind_ip}:{}>;tag={local_tag}", config.sip_port));
        let mut to = format!("<sip:{from_user}@{}>", dest.ip());
        if let Some(tag) = &remote_tag {
            to.push_str(&format!(";tag={tag}"));
        }
        req.headers.append("To", to);
        req.headers.append("Call-ID", call_id);
        req.headers.append("CSeq", format!("{cseq} {method}"));
        req.headers.append("Max-Forwards", "70");
        for (name, value) in extra_headers {
            req.headers.append(*name, value.clone());
        }
        req.headers.set("Content-Length", "0");

        self.deps.transport.send(&req, dest);
    }

    /// Handles one inbound RTP packet: applies the symmetric-RTP lock on
    /// first arrival (§8 invariant 4), pushes it into the jitter buffer,
    /// and — if that brings the buffer to depth — threads the popped
    /// packet through the pipeline and sends one outbound frame.
    ///
    /// Grounded on `original_source/src/call/CallSession.cpp::onRtpPacket`
    /// and `::processRtpFrame`.
    pub fn on_rtp_packet(&self, pkt: RtpPacket, sender: SocketAddr) {
        let expected_pt = {
            let mut inner = self.inner.lock();
            if !inner.rtp_locked {
                inner.remote_rtp_addr = Some(sender);
                inner.rtp_locked = true;
                tracing::info!(call_id = %self.call_id, %sender, "locked remote RTP source");
            }
            let expected_pt = inner.payload_type;
            if pkt.payload_type == expected_pt {
                inner.jitter.push(pkt);
            }
            expected_pt
        };
        let _ = expected_pt;
        self.pump_pipeline();
    }

    fn pump_pipeline(&self) {
        let popped = {
            let mut inner = self.inner.lock();
            inner.jitter.pop()
        };
        if let Some(pkt) = popped {
            self.process_and_emit(pkt);
        }
    }

    /// The flush-on-idle half of the jitter buffer (§9): called from the
    /// gateway's poll loop rather than from packet arrival, it drains every
    /// packet the buffer is holding past [`gateway_rtp::jitter::IDLE_FLUSH`]
    /// even though depth never reached [`gateway_rtp::jitter::DEPTH_TARGET`].
    /// Without this, the last few packets of a stream that goes quiet (e.g.
    /// BYE right after the final RTP frame) would stay buffered forever.
    pub fn drain_idle(&self) {
        loop {
            let popped = {
                let mut inner = self.inner.lock();
                inner.jitter.flush_idle()
            };
            match popped {
                Some(pkt) => self.process_and_emit(pkt),
                None => break,
            }
        }
    }

    fn process_and_emit(&self, pkt: RtpPacket) {
        let (remote_addr, local_port, payload_type) = {
            let inner = self.inner.lock();
            (inner.remote_rtp_addr, inner.local_rtp_port, inner.payload_type)
        };
        let (Some(remote_addr), Some(local_port)) = (remote_addr, local_port) else {
            return;
        };

        // Take the pipeline out of the lock for the actual processing — it
        // can block on a backend socket write — then put it back.
        let mut pipeline = match self.inner.lock().pipeline.take() {
            Some(pipeline) => pipeline,
            None => return,
        };
        pipeline.process_uplink(&pkt.payload);
        let downlink = pipeline.process_downlink();
        {
            let mut inner = self.inner.lock();
            // If the call was torn down while the pipeline was out of the
            // lock, let it drop here rather than resurrecting it.
            if inner.kind != CallStateKind::Terminated {
                inner.pipeline = Some(pipeline);
            }
        }

        if downlink.is_empty() {
            return;
        }

        let (seq, ts, ssrc) = {
            let mut inner = self.inner.lock();
            inner.outgoing_seq = inner.outgoing_seq.wrapping_add(1);
            inner.outgoing_ts = inner.outgoing_ts.wrapping_add(160);
            (inner.outgoing_seq, inner.outgoing_ts, inner.ssrc)
        };

        let out_pkt = RtpPacket {
            version: 2,
            marker: false,
            payload_type,
            sequence_number: seq,
            timestamp: ts,
            ssrc,
            payload: downlink,
        };
        if let Err(err) = self.deps.rtp.send(local_port, &out_pkt.serialize(), remote_addr) {
            tracing::debug!(call_id = %self.call_id, %err, "failed to send outbound RTP frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::registry::CallRegistry;
    use gateway_rtp::RtpWorkerPool;
    use gateway_sip::TransactionManager;
    use std::net::Ipv4Addr;

    struct NullTransport;
    impl SipTransport for NullTransport {
        fn send(&self, _msg: &SipMessage, _dest: SocketAddr) {}
    }

    fn deps() -> Deps {
        Deps {
            config: Arc::new(GatewayConfig::default()),
            registry: Arc::new(CallRegistry::new()),
            rtp: Arc::new(RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 35000, 35010, 1).unwrap()),
            transactions: Arc::new(TransactionManager::new()),
            transport: Arc::new(NullTransport),
        }
    }

    #[test]
    fn port_released_exactly_once_even_if_called_twice() {
        let session = CallSession::new("c1".to_string(), deps());
        session.allocate_port().unwrap();
        let port = session.local_port().unwrap();
        session.release_port();
        assert!(session.local_port().is_none());
        // Second release is a no-op, not a double-free of the pool slot.
        session.release_port();
        let (reused, _) = session.deps.rtp.allocate().unwrap();
        assert_eq!(reused, port);
    }

    #[test]
    fn first_rtp_packet_locks_remote_source() {
        let session = CallSession::new("c1".to_string(), deps());
        session.inner.lock().payload_type = 0;
        let sender: SocketAddr = "10.0.0.5:40000".parse().unwrap();
        let pkt = RtpPacket {
            version: 2,
            marker: false,
            payload_type: 0,
            sequence_number: 1,
            timestamp: 160,
            ssrc: 1,
            payload: vec![0xFF; 160],
        };
        session.on_rtp_packet(pkt, sender);
        assert_eq!(session.inner.lock().remote_rtp_addr, Some(sender));

        // A later packet from a different address must not move the lock.
        let other: SocketAddr = "10.0.0.6:40000".parse().unwrap();
        let pkt2 = RtpPacket {
            version: 2,
            marker: false,
            payload_type: 0,
            sequence_number: 2,
            timestamp: 320,
            ssrc: 1,
            payload: vec![0xFF; 160],
        };
        session.on_rtp_packet(pkt2, other);
        assert_eq!(session.inner.lock().remote_rtp_addr, Some(sender));
    }

    #[test]
    fn outgoing_timestamp_advances_by_160_once_jitter_buffer_reaches_depth() {
        let session = CallSession::new("c1".to_string(), deps());
        session.start_pipeline(0).unwrap();
        session.inner.lock().remote_rtp_addr = Some("127.0.0.1:40000".parse().unwrap());
        session.inner.lock().local_rtp_port = Some(40100);

        let base_ts = session.inner.lock().outgoing_ts;
        let base_seq = session.inner.lock().outgoing_seq;
        for seq in 0..gateway_rtp::jitter::DEPTH_TARGET as u16 {
            let pkt = RtpPacket {
                version: 2,
                marker: false,
                payload_type: 0,
                sequence_number: seq,
                timestamp: seq as u32 * 160,
                ssrc: 1,
                payload: vec![0xFFu8; 160],
            };
            session.on_rtp_packet(pkt, "10.0.0.5:40000".parse().unwrap());
        }
        // Only the first pop (at depth target) produces one outbound frame.
        assert_eq!(session.inner.lock().outgoing_ts, base_ts.wrapping_add(160));
        assert_eq!(session.inner.lock().outgoing_seq, base_seq.wrapping_add(1));
    }

    #[test]
    fn drain_idle_releases_the_stranded_tail_after_five_packets() {
        // §8 scenario 1: five RTP packets in must eventually yield five
        // RTP packets out, not just the one that pop() releases the
        // instant depth reaches DEPTH_TARGET.
        let session = CallSession::new("c1".to_string(), deps());
        session.start_pipeline(0).unwrap();
        session.inner.lock().remote_rtp_addr = Some("127.0.0.1:40000".parse().unwrap());
        session.inner.lock().local_rtp_port = Some(40101);

        let base_seq = session.inner.lock().outgoing_seq;
        for seq in 100..105u16 {
            let pkt = RtpPacket {
                version: 2,
                marker: false,
                payload_type: 0,
                sequence_number: seq,
                timestamp: seq as u32 * 160,
                ssrc: 1,
                payload: vec![0xFFu8; 160],
            };
            session.on_rtp_packet(pkt, "10.0.0.5:40000".parse().unwrap());
        }
        assert_eq!(session.inner.lock().outgoing_seq, base_seq.wrapping_add(1));

        std::thread::sleep(gateway_rtp::jitter::IDLE_FLUSH + std::time::Duration::from_millis(20));
        session.drain_idle();

        assert_eq!(session.inner.lock().outgoing_seq, base_seq.wrapping_add(5));
        assert!(session.inner.lock().jitter.is_empty());
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<SipMessage>>,
    }
    impl SipTransport for RecordingTransport {
        fn send(&self, msg: &SipMessage, _dest: SocketAddr) {
            self.sent.lock().push(msg.clone());
        }
    }

    fn deps_with_dialog(transport: Arc<RecordingTransport>) -> (Deps, Arc<CallSession>) {
        let deps = Deps {
            config: Arc::new(GatewayConfig::default()),
            registry: Arc::new(CallRegistry::new()),
            rtp: Arc::new(RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 36000, 36010, 1).unwrap()),
            transactions: Arc::new(TransactionManager::new()),
            transport,
        };
        let session = CallSession::new("c1@test".to_string(), deps.clone());
        session.set_users("alice".to_string(), "bob".to_string());
        session.set_remote_sip_addr("10.0.0.9:5060".parse().unwrap());
        let invite = {
            let mut req = SipMessage::new_request("INVITE", "sip:bob@127.0.0.1");
            req.headers.append("From", "<sip:alice@10.0.0.9>;tag=remotetag");
            req.headers.append("Call-ID", "c1@test");
            req.headers.append("CSeq", "1 INVITE");
            req
        };
        session.set_dialog(SipDialog::from_invite(&invite, "localtag".to_string()));
        (deps, session)
    }

    #[test]
    fn hangup_sends_bye_when_active_then_terminates() {
        let transport = Arc::new(RecordingTransport::default());
        let (_deps, session) = deps_with_dialog(transport.clone());
        session.set_kind(CallStateKind::Active);

        session.hangup();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method_token(), Some("BYE"));
        assert_eq!(sent[0].call_id(), Some("c1@test"));
        assert_eq!(session.kind(), CallStateKind::Terminated);
    }

    #[test]
    fn hangup_sends_nothing_when_not_active() {
        let transport = Arc::new(RecordingTransport::default());
        let (_deps, session) = deps_with_dialog(transport.clone());
        session.set_kind(CallStateKind::Idle);

        session.hangup();

        assert!(transport.sent.lock().is_empty());
        assert_eq!(session.kind(), CallStateKind::Terminated);
    }

    #[test]
    fn recorder_open_failure_does_not_fail_call_start() {
        // `recording_path` collides with an existing plain file, so the
        // recorder's `create_dir_all` fails — the call must still start.
        let blocker = std::env::temp_dir().join(format!("gateway-recpath-blocker-{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = GatewayConfig::default();
        config.recording_path = blocker.to_str().unwrap().to_string();
        let deps = Deps {
            config: Arc::new(config),
            registry: Arc::new(CallRegistry::new()),
            rtp: Arc::new(RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 37000, 37010, 1).unwrap()),
            transactions: Arc::new(TransactionManager::new()),
            transport: Arc::new(NullTransport),
        };
        let session = CallSession::new("c1".to_string(), deps);

        assert!(session.start_pipeline(0).is_ok());

        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn refer_sends_refer_with_refer_to_header() {
        let transport = Arc::new(RecordingTransport::default());
        let (_deps, session) = deps_with_dialog(transport.clone());

        session.refer("sip:charlie@10.0.0.1");

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method_token(), Some("REFER"));
        assert_eq!(sent[0].headers.get("Refer-To"), Some("sip:charlie@10.0.0.1"));
    }
}
