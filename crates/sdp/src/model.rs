//! SDP session model: only the lines the gateway reads or writes.
//!
//! Grounded on `original_source/src/sdp/SdpParser.cpp`: unknown line types
//! (`t=`, `b=`, `a=` other than `rtpmap`) are silently ignored, matching the
//! original's single-pass, best-effort parse.

use std::collections::HashMap;

/// A single `m=` media description.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaDescription {
    pub media_type: String,
    pub port: u16,
    pub proto: String,
    pub payload_types: Vec<u8>,
}

/// A parsed SDP session description.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdpSession {
    pub version: String,
    pub origin: String,
    pub session_name: String,
    pub connection_ip: Option<String>,
    pub media: Vec<MediaDescription>,
    /// `a=rtpmap:<pt> <name>/<rate>` entries, name only (rate dropped, the
    /// gateway only ever negotiates 8 kHz).
    pub rtp_map: HashMap<u8, String>,
}

impl SdpSession {
    /// The first `m=audio` media description, if any.
    pub fn audio_media(&self) -> Option<&MediaDescription> {
        self.media.iter().find(|m| m.media_type == "audio")
    }
}

/// A payload type, codec name, and clock rate negotiated from an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedCodec {
    pub payload_type: u8,
    pub name: String,
    pub clock_rate: u32,
}

/// Static payload type defaults used when an offer omits `a=rtpmap` for a
/// well-known type (RFC 3551 §6).
pub fn static_codec_name(pt: u8) -> Option<&'static str> {
    match pt {
        0 => Some("PCMU"),
        8 => Some("PCMA"),
        _ => None,
    }
}
