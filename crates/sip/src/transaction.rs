//! RFC 3261-style transaction state, keyed by `(Call-ID, top-Via branch,
//! CSeq method)`.
//!
//! Grounded on `original_source/src/sip/SipTransaction.h`: a cached last
//! response lets a retransmitted request be answered idempotently without
//! re-running the state machine (§4.F / §8 invariant 3).

use crate::constants::Method;
use crate::message::SipMessage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Which sub-FSM governs a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ServerInvite,
    ServerNonInvite,
}

/// Transaction lifecycle state (server-side; this gateway never originates
/// a UAC INVITE transaction of its own, only in-dialog BYE/REFER which this
/// module tracks the same way under the non-INVITE sub-FSM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

/// Identifies a transaction: Call-ID, top Via branch, and the method named
/// in the CSeq header of the request that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub call_id: String,
    pub branch: String,
    pub method: Method,
}

/// A single server transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    pub state: TransactionState,
    pub cached_response: Option<SipMessage>,
    last_activity: Instant,
}

impl Transaction {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// The outcome of submitting an incoming request to the transaction layer.
pub enum Admission {
    /// No matching transaction existed; a new one was created and the
    /// request should be processed by the call state machine.
    New,
    /// A transaction for this request already exists and has a cached final
    /// response: re-send it verbatim and do not re-execute side effects.
    Retransmit(SipMessage),
    /// The request is an ACK that moved a Completed INVITE transaction to
    /// Confirmed. No response is sent and no side effects should run.
    AckAccepted,
}

const COMPLETED_TIMEOUT: Duration = Duration::from_secs(32);
const HARD_CEILING: Duration = Duration::from_secs(64);

/// Process-wide transaction table, guarded by a single mutex per §5.
pub struct TransactionManager {
    inner: Mutex<HashMap<TransactionKey, Transaction>>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Submits an incoming request. Returns [`Admission::New`] the first
    /// time a `(Call-ID, branch, CSeq method)` is seen, or a cached
    /// response/ACK-absorption outcome on subsequent arrivals.
    pub fn admit_request(&self, call_id: &str, branch: &str, req_method: Method) -> Admission {
        let mut table = self.inner.lock();

        if req_method == Method::Ack {
            // ACK to a non-2xx final response shares the INVITE transaction's
            // branch; RFC 3261 has the ACK's own CSeq method field read "ACK",
            // so transaction lookup falls back to the parent INVITE key.
            let invite_key = TransactionKey {
                call_id: call_id.to_string(),
                branch: branch.to_string(),
                method: Method::Invite,
            };
            if let Some(txn) = table.get_mut(&invite_key) {
                if txn.state == TransactionState::Completed {
                    txn.state = TransactionState::Confirmed;
                    txn.touch();
                    return Admission::AckAccepted;
                }
            }
            return Admission::New;
        }

        let key = TransactionKey {
            call_id: call_id.to_string(),
            branch: branch.to_string(),
            method: req_method,
        };

        if let Some(txn) = table.get_mut(&key) {
            txn.touch();
            // Any state past Trying has a final or provisional response on
            // file; replay it rather than re-running side effects. This
            // also covers the INVITE sub-FSM's 2xx case, which jumps
            // straight to Terminated (§4.F) but must still answer a
            // retransmitted INVITE identically until the transaction is
            // reaped by `sweep` (§8 scenario: duplicate INVITE inside the
            // 32s linger window gets the byte-identical 200 OK back).
            if txn.state != TransactionState::Trying {
                if let Some(cached) = &txn.cached_response {
                    return Admission::Retransmit(cached.clone());
                }
            }
            return Admission::New;
        }

        let kind = if req_method.is_invite_like() {
            TransactionKind::ServerInvite
        } else {
            TransactionKind::ServerNonInvite
        };
        table.insert(
            key.clone(),
            Transaction {
                key,
                kind,
                state: TransactionState::Trying,
                cached_response: None,
                last_activity: Instant::now(),
            },
        );
        Admission::New
    }

    /// Records that `response` was sent for the transaction matching
    /// `(call_id, branch, req_method)`, advancing its state per the
    /// INVITE/non-INVITE sub-FSM (§4.F) and caching it for retransmits.
    pub fn on_response_sent(
        &self,
        call_id: &str,
        branch: &str,
        req_method: Method,
        status_code: u16,
        response: &SipMessage,
    ) {
        let key = TransactionKey {
            call_id: call_id.to_string(),
            branch: branch.to_string(),
            method: req_method,
        };
        let mut table = self.inner.lock();
        let Some(txn) = table.get_mut(&key) else {
            return;
        };
        txn.touch();
        txn.cached_response = Some(response.clone());

        match txn.kind {
            TransactionKind::ServerInvite => {
                txn.state = match status_code {
                    100..=199 => TransactionState::Proceeding,
                    200..=299 => TransactionState::Terminated,
                    _ => TransactionState::Completed,
                };
            }
            TransactionKind::ServerNonInvite => {
                txn.state = match status_code {
                    100..=199 => TransactionState::Proceeding,
                    _ => TransactionState::Completed,
                };
            }
        }
    }

    /// Periodic sweep: drops Completed/Confirmed/Terminated transactions
    /// idle past 32s, and anything idle past the 64s hard ceiling
    /// regardless of state.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut table = self.inner.lock();
        table.retain(|_, txn| {
            let idle = now.duration_since(txn.last_activity);
            if idle >= HARD_CEILING {
                return false;
            }
            if idle >= COMPLETED_TIMEOUT
                && matches!(
                    txn.state,
                    TransactionState::Completed
                        | TransactionState::Confirmed
                        | TransactionState::Terminated
                )
            {
                return false;
            }
            true
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response() -> SipMessage {
        SipMessage::new_response(200, "OK")
    }

    #[test]
    fn first_request_is_admitted_as_new() {
        let mgr = TransactionManager::new();
        assert!(matches!(
            mgr.admit_request("c1", "z9hG4bK1", Method::Invite),
            Admission::New
        ));
    }

    #[test]
    fn retransmitted_invite_in_completed_replays_cached_response() {
        let mgr = TransactionManager::new();
        mgr.admit_request("c1", "z9hG4bK1", Method::Invite);
        let resp = {
            let mut r = ok_response();
            r.body = b"answer".to_vec();
            r
        };
        mgr.on_response_sent("c1", "z9hG4bK1", Method::Invite, 486, &resp);

        match mgr.admit_request("c1", "z9hG4bK1", Method::Invite) {
            Admission::Retransmit(cached) => assert_eq!(cached.body, b"answer"),
            _ => panic!("expected retransmit"),
        }
    }

    #[test]
    fn ack_moves_completed_invite_transaction_to_confirmed() {
        let mgr = TransactionManager::new();
        mgr.admit_request("c1", "z9hG4bK1", Method::Invite);
        mgr.on_response_sent("c1", "z9hG4bK1", Method::Invite, 486, &ok_response());

        assert!(matches!(
            mgr.admit_request("c1", "z9hG4bK1", Method::Ack),
            Admission::AckAccepted
        ));

        let table = mgr.inner.lock();
        let key = TransactionKey {
            call_id: "c1".into(),
            branch: "z9hG4bK1".into(),
            method: Method::Invite,
        };
        assert_eq!(table.get(&key).unwrap().state, TransactionState::Confirmed);
    }

    #[test]
    fn retransmitted_invite_after_200_ok_replays_cached_response() {
        let mgr = TransactionManager::new();
        mgr.admit_request("c1", "z9hG4bK1", Method::Invite);
        let resp = {
            let mut r = ok_response();
            r.body = b"sdp answer".to_vec();
            r
        };
        mgr.on_response_sent("c1", "z9hG4bK1", Method::Invite, 200, &resp);

        // The transaction is already Terminated (2xx on INVITE ends it
        // immediately), but a duplicate INVITE inside the linger window
        // must still get the identical answer, not a freshly processed one.
        match mgr.admit_request("c1", "z9hG4bK1", Method::Invite) {
            Admission::Retransmit(cached) => assert_eq!(cached.body, b"sdp answer"),
            _ => panic!("expected retransmit of the cached 200 OK"),
        }
    }

    #[test]
    fn two_hundred_ok_on_invite_terminates_transaction_immediately() {
        let mgr = TransactionManager::new();
        mgr.admit_request("c1", "z9hG4bK1", Method::Invite);
        mgr.on_response_sent("c1", "z9hG4bK1", Method::Invite, 200, &ok_response());
        let table = mgr.inner.lock();
        let key = TransactionKey {
            call_id: "c1".into(),
            branch: "z9hG4bK1".into(),
            method: Method::Invite,
        };
        assert_eq!(table.get(&key).unwrap().state, TransactionState::Terminated);
    }
}
