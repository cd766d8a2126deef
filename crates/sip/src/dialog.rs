//! Confirmed-call context keyed by `(Call-ID, local-tag, remote-tag)`.
//!
//! Grounded on `original_source/src/sip/SipDialog.h`, reduced to the fields
//! this gateway's UAS-only role actually uses (no route set — the gateway
//! never proxies).

use crate::message::{extract_tag, SipMessage};

/// Dialog lifecycle per RFC 3261 §12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Early,
    Confirmed,
    Terminated,
}

/// A confirmed (or early) dialog established by an INVITE transaction.
#[derive(Debug, Clone)]
pub struct SipDialog {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: Option<String>,
    pub state: DialogState,
    /// Monotone CSeq for requests this gateway originates in-dialog (BYE, REFER).
    pub local_cseq: u32,
    /// Lower bound on CSeq for requests the remote party sends in-dialog.
    pub remote_cseq: u32,
}

impl SipDialog {
    /// Creates a dialog from the INVITE that established it and the local
    /// tag this gateway attached to its final response.
    pub fn from_invite(invite: &SipMessage, local_tag: String) -> Self {
        let call_id = invite.call_id().unwrap_or_default().to_string();
        let remote_tag = invite.headers.get("From").and_then(extract_tag).map(str::to_string);
        let remote_cseq = invite.cseq().map(|(n, _)| n).unwrap_or(0);
        SipDialog {
            call_id,
            local_tag,
            remote_tag,
            state: DialogState::Early,
            local_cseq: 0,
            remote_cseq,
        }
    }

    pub fn confirm(&mut self) {
        self.state = DialogState::Confirmed;
    }

    pub fn terminate(&mut self) {
        self.state = DialogState::Terminated;
    }

    /// Accepts an in-dialog request's CSeq as the new lower bound, rejecting
    /// anything that doesn't advance it (a stray retransmit or reorder is
    /// handled by the transaction layer, not here).
    pub fn observe_remote_cseq(&mut self, cseq: u32) -> bool {
        if cseq < self.remote_cseq {
            return false;
        }
        self.remote_cseq = cseq;
        true
    }

    /// Allocates the next local CSeq for an in-dialog request this gateway
    /// originates (e.g. a BYE sent after an audio-socket disconnect).
    pub fn next_local_cseq(&mut self) -> u32 {
        self.local_cseq += 1;
        self.local_cseq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SipMessage;

    #[test]
    fn dialog_from_invite_captures_remote_tag_and_cseq() {
        let raw = concat!(
            "INVITE sip:bob@host SIP/2.0\r\n",
            "From: <sip:alice@host>;tag=abc\r\n",
            "Call-ID: c1\r\n",
            "CSeq: 5 INVITE\r\n",
            "\r\n"
        );
        let invite = SipMessage::parse(raw.as_bytes()).unwrap();
        let dialog = SipDialog::from_invite(&invite, "local-tag".to_string());
        assert_eq!(dialog.remote_tag.as_deref(), Some("abc"));
        assert_eq!(dialog.remote_cseq, 5);
        assert_eq!(dialog.state, DialogState::Early);
    }

    #[test]
    fn remote_cseq_must_not_regress() {
        let mut dialog = SipDialog {
            call_id: "c1".into(),
            local_tag: "lt".into(),
            remote_tag: None,
            state: DialogState::Confirmed,
            local_cseq: 0,
            remote_cseq: 5,
        };
        assert!(!dialog.observe_remote_cseq(3));
        assert!(dialog.observe_remote_cseq(6));
        assert_eq!(dialog.remote_cseq, 6);
    }
}
