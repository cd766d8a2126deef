//! Builds a response correlated to a request by copying the headers that
//! identify the transaction/dialog.
//!
//! Grounded on `original_source/src/sip/SipResponseBuilder.cpp`, with the
//! original's time-based ad-hoc tag replaced by [`crate::tag::generate_tag`].

use crate::message::{extract_tag, SipMessage};

/// Builds `code reason` in response to `req`, copying every `Via`, and the
/// `From`, `To`, `Call-ID` and `CSeq` headers verbatim. A missing `tag=` on
/// `To` is filled in with a freshly generated tag once the response is
/// final (`code >= 200`), matching §6's "tag auto-generated on final
/// responses if missing".
pub fn create_response(req: &SipMessage, code: u16, reason: &str) -> SipMessage {
    let mut res = SipMessage::new_response(code, reason);

    for via in req.headers.get_all("Via") {
        res.headers.append("Via", via);
    }
    if let Some(from) = req.headers.get("From") {
        res.headers.append("From", from);
    }
    if let Some(to) = req.headers.get("To") {
        let mut to_value = to.to_string();
        if code >= 200 && extract_tag(&to_value).is_none() {
            to_value.push_str(";tag=");
            to_value.push_str(&crate::tag::generate_tag());
        }
        res.headers.append("To", to_value);
    }
    if let Some(call_id) = req.headers.get("Call-ID") {
        res.headers.append("Call-ID", call_id);
    }
    if let Some(cseq) = req.headers.get("CSeq") {
        res.headers.append("CSeq", cseq);
    }
    res.headers.append("User-Agent", "sip-rtp-gateway");

    res
}

/// Extracts the `tag=` parameter from the response's `To` header, if any.
pub fn to_tag(res: &SipMessage) -> Option<&str> {
    extract_tag(res.headers.get("To")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invite() -> SipMessage {
        let raw = concat!(
            "INVITE sip:bob@127.0.0.1 SIP/2.0\r\n",
            "Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK1\r\n",
            "From: <sip:alice@10.0.0.1>;tag=abc\r\n",
            "To: <sip:bob@127.0.0.1>\r\n",
            "Call-ID: c1\r\n",
            "CSeq: 1 INVITE\r\n",
            "Content-Length: 0\r\n\r\n",
        );
        SipMessage::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn copies_dialog_identifying_headers() {
        let req = sample_invite();
        let res = create_response(&req, 200, "OK");
        assert_eq!(res.headers.get("Call-ID"), Some("c1"));
        assert_eq!(res.headers.get("CSeq"), Some("1 INVITE"));
        assert!(res.headers.get("Via").unwrap().contains("branch=z9hG4bK1"));
    }

    #[test]
    fn adds_to_tag_only_for_final_responses_missing_one() {
        let req = sample_invite();

        let provisional = create_response(&req, 100, "Trying");
        assert!(to_tag(&provisional).is_none());

        let final_res = create_response(&req, 200, "OK");
        assert!(to_tag(&final_res).is_some());
    }

    #[test]
    fn preserves_existing_to_tag() {
        let mut req = sample_invite();
        req.headers.set("To", "<sip:bob@127.0.0.1>;tag=existing");
        let res = create_response(&req, 200, "OK");
        assert_eq!(to_tag(&res), Some("existing"));
    }
}
