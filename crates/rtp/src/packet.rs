//! RTP header codec and RTCP packet-type classification.
//!
//! Grounded on `original_source/src/rtp/RtpPacket.cpp` and
//! `original_source/src/rtp/RtcpPacket.cpp`.

/// Fixed RTP header length in bytes (no CSRC list, no extension — this
/// gateway neither sends nor expects either).
pub const HEADER_LEN: usize = 12;

/// Largest RTP packet this gateway will read or write (typical Ethernet
/// MTU minus IP/UDP overhead, rounded up).
pub const MAX_PACKET_LEN: usize = 1500;

/// A parsed RTP packet: fixed header fields plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    /// Parses a packet from wire bytes. Returns `None` on underflow (fewer
    /// than [`HEADER_LEN`] bytes) rather than an error — a short datagram on
    /// the RTP port is simply not RTP.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let version = data[0] >> 6;
        let marker = (data[1] & 0x80) != 0;
        let payload_type = data[1] & 0x7f;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let payload = data[HEADER_LEN..].to_vec();

        Some(RtpPacket {
            version,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            payload,
        })
    }

    /// Serializes this packet to wire bytes. Always emits V=2, P=0, X=0, CC=0.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(0b1000_0000); // V=2, P=0, X=0, CC=0
        out.push((self.payload_type & 0x7f) | if self.marker { 0x80 } else { 0 });
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// RTCP packet types this gateway distinguishes; anything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpPacketType {
    SenderReport,
    ReceiverReport,
    Bye,
    Other(u8),
}

/// Classifies an RTCP packet by its second byte (packet type). Returns
/// `None` on underflow.
pub fn classify_rtcp(data: &[u8]) -> Option<RtcpPacketType> {
    let pt = *data.get(1)?;
    Some(match pt {
        200 => RtcpPacketType::SenderReport,
        201 => RtcpPacketType::ReceiverReport,
        203 => RtcpPacketType::Bye,
        other => RtcpPacketType::Other(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_rejects_short_buffers() {
        assert!(RtpPacket::parse(&[0u8; 11]).is_none());
    }

    #[test]
    fn serialize_always_sets_v2_and_zero_flags() {
        let pkt = RtpPacket {
            version: 2,
            marker: true,
            payload_type: 0,
            sequence_number: 100,
            timestamp: 16000,
            ssrc: 0xdeadbeef,
            payload: vec![0xffu8; 160],
        };
        let bytes = pkt.serialize();
        assert_eq!(bytes[0], 0b1000_0000);
        assert_eq!(bytes[1] & 0x80, 0x80);
        assert_eq!(bytes[1] & 0x7f, 0);
    }

    #[test]
    fn classifies_known_rtcp_types() {
        assert_eq!(classify_rtcp(&[0x80, 200]), Some(RtcpPacketType::SenderReport));
        assert_eq!(classify_rtcp(&[0x80, 201]), Some(RtcpPacketType::ReceiverReport));
        assert_eq!(classify_rtcp(&[0x80, 203]), Some(RtcpPacketType::Bye));
        assert_eq!(classify_rtcp(&[0x80, 199]), Some(RtcpPacketType::Other(199)));
    }

    proptest! {
        #[test]
        fn parse_serialize_roundtrip(
            pt in 0u8..128,
            seq in any::<u16>(),
            ts in any::<u32>(),
            ssrc in any::<u32>(),
            payload in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let pkt = RtpPacket {
                version: 2,
                marker: false,
                payload_type: pt,
                sequence_number: seq,
                timestamp: ts,
                ssrc,
                payload: payload.clone(),
            };
            let bytes = pkt.serialize();
            let parsed = RtpPacket::parse(&bytes).unwrap();
            prop_assert_eq!(parsed.payload_type, pt);
            prop_assert_eq!(parsed.sequence_number, seq);
            prop_assert_eq!(parsed.timestamp, ts);
            prop_assert_eq!(parsed.ssrc, ssrc);
            prop_assert_eq!(parsed.payload, payload);
        }
    }
}
