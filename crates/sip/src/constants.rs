//! SIP methods and status codes the gateway recognises or emits.
//!
//! Grounded on `original_source/src/sip/SipConstants.h`: the original keeps a
//! wider status-code table than the call state machine actually reaches, so
//! malformed or out-of-scope requests still get a correct, specific reply
//! instead of a generic one.

use std::fmt;

/// SIP request methods this gateway parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Options,
    Refer,
    Register,
    Update,
}

impl Method {
    /// Parses a method token from a request line. Case-sensitive per RFC 3261.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "REFER" => Method::Refer,
            "REGISTER" => Method::Register,
            "UPDATE" => Method::Update,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Refer => "REFER",
            Method::Register => "REGISTER",
            Method::Update => "UPDATE",
        }
    }

    /// Whether a server transaction for this method follows the INVITE
    /// sub-FSM (Trying/Proceeding/Completed/Confirmed) or the non-INVITE one.
    pub fn is_invite_like(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code + default reason phrase pairs the gateway can emit.
pub mod status {
    pub const TRYING: (u16, &str) = (100, "Trying");
    pub const RINGING: (u16, &str) = (180, "Ringing");
    pub const OK: (u16, &str) = (200, "OK");
    pub const ACCEPTED: (u16, &str) = (202, "Accepted");
    pub const BAD_REQUEST: (u16, &str) = (400, "Bad Request");
    pub const FORBIDDEN: (u16, &str) = (403, "Forbidden");
    pub const NOT_FOUND: (u16, &str) = (404, "Not Found");
    pub const CALL_DOES_NOT_EXIST: (u16, &str) = (481, "Call/Transaction Does Not Exist");
    pub const METHOD_NOT_ALLOWED: (u16, &str) = (405, "Method Not Allowed");
    pub const REQUEST_TIMEOUT: (u16, &str) = (408, "Request Timeout");
    pub const NOT_ACCEPTABLE: (u16, &str) = (488, "Not Acceptable Here");
    pub const REQUEST_PENDING: (u16, &str) = (491, "Request Pending");
    pub const SESSION_INTERVAL_TOO_SMALL: (u16, &str) = (422, "Session Interval Too Small");
    pub const BUSY_HERE: (u16, &str) = (486, "Busy Here");
    pub const REQUEST_TERMINATED: (u16, &str) = (487, "Request Terminated");
    pub const INTERNAL_SERVER_ERROR: (u16, &str) = (500, "Internal Server Error");
    pub const NOT_IMPLEMENTED: (u16, &str) = (501, "Not Implemented");
    pub const SERVICE_UNAVAILABLE: (u16, &str) = (503, "Service Unavailable");
    pub const SERVER_TIMEOUT: (u16, &str) = (504, "Server Time-out");
    pub const DECLINE: (u16, &str) = (603, "Decline");
}

/// Header names the gateway reads or writes, spelled exactly as emitted on
/// the wire. `HeaderMap` lookups are case-insensitive, so these exist to
/// avoid re-typing the same literal at every call site rather than for
/// correctness.
pub mod header {
    pub const VIA: &str = "Via";
    pub const FROM: &str = "From";
    pub const TO: &str = "To";
    pub const CALL_ID: &str = "Call-ID";
    pub const CSEQ: &str = "CSeq";
    pub const CONTACT: &str = "Contact";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const MAX_FORWARDS: &str = "Max-Forwards";
    pub const EXPIRES: &str = "Expires";
    pub const REFER_TO: &str = "Refer-To";
    pub const SESSION_EXPIRES: &str = "Session-Expires";
    pub const SUPPORTED: &str = "Supported";
    pub const REQUIRE: &str = "Require";
}
