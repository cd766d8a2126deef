//! SIP message codec, transaction layer, and dialog state for the gateway.
//!
//! This crate is deliberately narrower than a general-purpose SIP stack: it
//! implements exactly the subset RFC 3261 subset the gateway's UAS role
//! needs (§4.A/§4.F of the design document), matching
//! `original_source/src/sip/*`.

pub mod constants;
pub mod dialog;
pub mod error;
pub mod message;
pub mod response;
pub mod tag;
pub mod transaction;

pub use constants::Method;
pub use dialog::{DialogState, SipDialog};
pub use error::{Error, Result};
pub use message::{extract_param, extract_tag, extract_user, extract_user_host, HeaderMap, SipMessage, StartLine};
pub use response::create_response;
pub use transaction::{Admission, Transaction, TransactionKey, TransactionManager, TransactionState};
