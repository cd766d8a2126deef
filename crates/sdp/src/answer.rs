use crate::error::{Error, Result};
use crate::model::{static_codec_name, NegotiatedCodec, SdpSession};

/// Picks the first payload type (in preference order) that appears in the
/// offer's audio media, then emits an answer for it.
///
/// Grounded on `original_source/src/sdp/SdpAnswer.cpp`: preference is
/// outer, offered payload types are inner — a higher-preference codec wins
/// even if it appears later in the offer's `m=audio` payload list.
pub fn negotiate(offer: &SdpSession, preference: &[String]) -> Result<NegotiatedCodec> {
    let audio = offer.audio_media().ok_or(Error::NoAudioMedia)?;

    for pref in preference {
        for &pt in &audio.payload_types {
            let name = offer
                .rtp_map
                .get(&pt)
                .cloned()
                .or_else(|| static_codec_name(pt).map(str::to_string));
            if name.as_deref() == Some(pref.as_str()) {
                return Ok(NegotiatedCodec {
                    payload_type: pt,
                    name: pref.clone(),
                    clock_rate: 8000,
                });
            }
        }
    }

    Err(Error::NoCodec)
}

/// Renders an SDP answer for a negotiated codec, matching the exact line
/// order/content `original_source/src/sdp/SdpAnswer.cpp` emits.
pub fn render_answer(local_ip: &str, local_port: u16, codec: &NegotiatedCodec) -> String {
    format!(
        "v=0\r\no=- 123456 123456 IN IP4 {ip}\r\ns=Gateway\r\nc=IN IP4 {ip}\r\nt=0 0\r\nm=audio {port} RTP/AVP {pt}\r\na=rtpmap:{pt} {name}/{rate}\r\na=sendrecv\r\n",
        ip = local_ip,
        port = local_port,
        pt = codec.payload_type,
        name = codec.name,
        rate = codec.clock_rate,
    )
}

/// Parses the offer, negotiates a codec, and renders the answer in one step.
pub fn answer(
    offer_body: &str,
    local_ip: &str,
    local_port: u16,
    preference: &[String],
) -> Result<(String, NegotiatedCodec)> {
    let offer = crate::parser::parse(offer_body);
    let codec = negotiate(&offer, preference)?;
    Ok((render_answer(local_ip, local_port, &codec), codec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pref(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn negotiates_pcmu_when_preferred_and_offered() {
        let offer = crate::parser::parse(
            "v=0\r\nc=IN IP4 10.0.0.1\r\nm=audio 40000 RTP/AVP 0 8\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\n",
        );
        let codec = negotiate(&offer, &pref(&["PCMU", "PCMA"])).unwrap();
        assert_eq!(codec.payload_type, 0);
        assert_eq!(codec.name, "PCMU");
    }

    #[test]
    fn falls_back_to_static_defaults_without_rtpmap() {
        let offer = crate::parser::parse("v=0\r\nc=IN IP4 10.0.0.1\r\nm=audio 40000 RTP/AVP 0 8\r\n");
        let codec = negotiate(&offer, &pref(&["PCMA"])).unwrap();
        assert_eq!(codec.payload_type, 8);
        assert_eq!(codec.name, "PCMA");
    }

    #[test]
    fn no_common_codec_is_an_error() {
        let offer = crate::parser::parse("v=0\r\nm=audio 40000 RTP/AVP 99\r\n");
        assert_eq!(negotiate(&offer, &pref(&["PCMU"])), Err(Error::NoCodec));
    }

    #[test]
    fn answer_round_trip_reflects_local_port_and_codec() {
        let (answer_body, codec) = answer(
            "v=0\r\nc=IN IP4 10.0.0.1\r\nm=audio 40000 RTP/AVP 0\r\na=rtpmap:0 PCMU/8000\r\n",
            "192.0.2.1",
            40100,
            &pref(&["PCMU", "PCMA"]),
        )
        .unwrap();
        let reparsed = crate::parser::parse(&answer_body);
        let audio = reparsed.audio_media().unwrap();
        assert_eq!(audio.port, 40100);
        assert_eq!(audio.payload_types, vec![codec.payload_type]);
        assert_eq!(reparsed.rtp_map.get(&codec.payload_type), Some(&codec.name));
    }
}
