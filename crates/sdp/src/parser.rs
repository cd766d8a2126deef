use crate::model::{MediaDescription, SdpSession};

/// Parses an SDP body. Never fails: unrecognised or malformed lines are
/// skipped, matching `original_source/src/sdp/SdpParser.cpp`. Callers that
/// need "was there usable audio" should check [`SdpSession::audio_media`].
pub fn parse(body: &str) -> SdpSession {
    let mut session = SdpSession::default();

    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.len() < 2 || line.as_bytes()[1] != b'=' {
            continue;
        }
        let kind = line.as_bytes()[0] as char;
        let value = &line[2..];

        match kind {
            'v' => session.version = value.to_string(),
            'o' => session.origin = value.to_string(),
            's' => session.session_name = value.to_string(),
            'c' => {
                if let Some(ip) = parse_connection(value) {
                    session.connection_ip = Some(ip);
                }
            }
            'm' => {
                if let Some(media) = parse_media(value) {
                    session.media.push(media);
                }
            }
            'a' => {
                if let Some(stripped) = value.strip_prefix("rtpmap:") {
                    if let Some((pt, name)) = parse_rtpmap(stripped) {
                        session.rtp_map.insert(pt, name);
                    }
                }
            }
            _ => {}
        }
    }

    session
}

fn parse_connection(value: &str) -> Option<String> {
    if !value.contains("IN IP4") {
        return None;
    }
    value.rsplit(' ').next().map(str::to_string)
}

fn parse_media(value: &str) -> Option<MediaDescription> {
    let mut parts = value.split_whitespace();
    let media_type = parts.next()?.to_string();
    let port: u16 = parts.next()?.parse().ok()?;
    let proto = parts.next()?.to_string();
    let payload_types = parts.filter_map(|p| p.parse::<u8>().ok()).collect();
    Some(MediaDescription {
        media_type,
        port,
        proto,
        payload_types,
    })
}

fn parse_rtpmap(value: &str) -> Option<(u8, String)> {
    let mut parts = value.splitn(2, ' ');
    let pt: u8 = parts.next()?.parse().ok()?;
    let codec_and_rate = parts.next()?;
    let name = codec_and_rate.split('/').next()?.to_string();
    Some((pt, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offer_with_rtpmap() {
        let body = concat!(
            "v=0\r\n",
            "o=- 1 1 IN IP4 10.0.0.1\r\n",
            "s=-\r\n",
            "c=IN IP4 10.0.0.1\r\n",
            "t=0 0\r\n",
            "m=audio 40000 RTP/AVP 0 8\r\n",
            "a=rtpmap:0 PCMU/8000\r\n",
            "a=rtpmap:8 PCMA/8000\r\n",
        );
        let session = parse(body);
        assert_eq!(session.connection_ip.as_deref(), Some("10.0.0.1"));
        let audio = session.audio_media().unwrap();
        assert_eq!(audio.port, 40000);
        assert_eq!(audio.payload_types, vec![0, 8]);
        assert_eq!(session.rtp_map.get(&0).map(String::as_str), Some("PCMU"));
    }

    #[test]
    fn ignores_unknown_lines() {
        let body = "v=0\r\nx=bogus\r\nb=AS:64\r\nm=audio 1000 RTP/AVP 0\r\n";
        let session = parse(body);
        assert_eq!(session.media.len(), 1);
    }

    #[test]
    fn offer_without_audio_media_yields_empty_media_list() {
        let body = "v=0\r\no=- 1 1 IN IP4 10.0.0.1\r\n";
        let session = parse(body);
        assert!(session.audio_media().is_none());
    }
}
