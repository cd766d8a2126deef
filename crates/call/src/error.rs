//! Composed error type for everything the call state machine can fail on.
//!
//! Grounded on `original_source/src/sip/states/IdleState.cpp`'s ladder of
//! SDP-parse / port-allocation / codec-negotiation / pipeline-start
//! failures, each mapped to its own final response. Rather than matching on
//! each component crate's error type at every call site, the component
//! errors are folded into one enum here and mapped to a status code once,
//! in `states::idle`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while setting up or renegotiating a call.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Sdp(#[from] gateway_sdp::Error),

    #[error(transparent)]
    Rtp(#[from] gateway_rtp::Error),

    #[error(transparent)]
    Media(#[from] gateway_media::Error),
}
