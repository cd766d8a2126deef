//! SIP message parsing and serialization.
//!
//! Grounded on `original_source/src/sip/SipMessage.cpp` and
//! `original_source/src/sip/SipParser.cpp`: a request/response union, an
//! ordered header multi-map, and a `Content-Length`-bounded opaque body.
//! There is no URI grammar here — the gateway only ever needs the bare
//! `user@host` portion of a request-URI or a From/To address, extracted with
//! [`extract_user`] and [`extract_tag`].

use crate::error::{Error, Result};
use std::fmt;

/// A single stored header: the name exactly as received (for faithful
/// serialization) plus its value. Lookups compare names case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    value: String,
}

/// An ordered multi-map of SIP headers, keyed case-insensitively.
///
/// Insertion order is preserved so re-serialization reproduces the wire
/// order of a parsed message. Folded continuation lines are joined into the
/// most recently inserted header's value with a single space, matching
/// `original_source`'s `SipParser` behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, preserving any existing headers of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(HeaderEntry {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Replaces all existing values for `name` with a single new value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(&name));
        self.append(name, value);
    }

    /// Returns the first value stored for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.as_str())
    }

    /// Returns every value stored for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Appends a continuation line (folded header) to the most recently
    /// inserted header's value with a single space separator.
    fn fold_into_last(&mut self, continuation: &str) -> Result<()> {
        match self.entries.last_mut() {
            Some(last) => {
                last.value.push(' ');
                last.value.push_str(continuation.trim());
                Ok(())
            }
            None => Err(Error::MalformedHeader(format!(
                "continuation line with no preceding header: {continuation}"
            ))),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value.as_str()))
    }
}

/// The start line of a SIP message: either a request or a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method_token: String,
        request_uri: String,
        version: String,
    },
    Response {
        version: String,
        status_code: u16,
        reason: String,
    },
}

/// A parsed SIP message: start line, ordered headers, opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub start: StartLine,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl SipMessage {
    /// Builds a bare request with no headers or body.
    pub fn new_request(method_token: &str, request_uri: &str) -> Self {
        SipMessage {
            start: StartLine::Request {
                method_token: method_token.to_string(),
                request_uri: request_uri.to_string(),
                version: "SIP/2.0".to_string(),
            },
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Builds a bare response with no headers or body.
    pub fn new_response(status_code: u16, reason: &str) -> Self {
        SipMessage {
            start: StartLine::Response {
                version: "SIP/2.0".to_string(),
                status_code,
                reason: reason.to_string(),
            },
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start, StartLine::Request { .. })
    }

    pub fn method_token(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { method_token, .. } => Some(method_token),
            StartLine::Response { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.start {
            StartLine::Response { status_code, .. } => Some(*status_code),
            StartLine::Request { .. } => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers.get("Call-ID")
    }

    pub fn cseq(&self) -> Option<(u32, &str)> {
        let value = self.headers.get("CSeq")?;
        let mut parts = value.splitn(2, ' ');
        let num = parts.next()?.trim().parse().ok()?;
        let method = parts.next()?.trim();
        Some((num, method))
    }

    /// Top Via header's `branch=` parameter, if present.
    pub fn top_via_branch(&self) -> Option<&str> {
        let via = self.headers.get("Via")?;
        extract_param(via, "branch")
    }

    /// Parses a single UDP datagram into a [`SipMessage`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header_end = find_header_terminator(data)
            .ok_or_else(|| Error::MalformedStartLine("no header terminator".to_string()))?;
        let header_block = std::str::from_utf8(&data[..header_end.0])
            .map_err(|_| Error::MalformedStartLine("header block is not UTF-8".to_string()))?;

        let mut lines = split_lines(header_block);
        let first_line = lines
            .next()
            .ok_or_else(|| Error::MalformedStartLine("empty message".to_string()))?;
        let start = parse_start_line(first_line)?;

        let mut headers = HeaderMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                headers.fold_into_last(line)?;
                continue;
            }
            let colon = line
                .find(':')
                .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;
            let name = line[..colon].trim();
            if name.is_empty() {
                return Err(Error::MalformedHeader(line.to_string()));
            }
            let value = line[colon + 1..].trim();
            headers.append(name, value);
        }

        let body_start = header_end.1;
        let available = data.len() - body_start;
        let body = if let Some(len) = headers.get("Content-Length").and_then(|v| v.trim().parse::<usize>().ok()) {
            if len > available {
                return Err(Error::TruncatedBody {
                    expected: len,
                    actual: available,
                });
            }
            data[body_start..body_start + len].to_vec()
        } else {
            data[body_start..].to_vec()
        };

        Ok(SipMessage {
            start,
            headers,
            body,
        })
    }

    /// Serializes this message back to wire bytes. `Content-Length` is
    /// appended from `body.len()` if the message doesn't already carry one.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        let start_line = match &self.start {
            StartLine::Request {
                method_token,
                request_uri,
                version,
            } => format!("{method_token} {request_uri} {version}\r\n"),
            StartLine::Response {
                version,
                status_code,
                reason,
            } => format!("{version} {status_code} {reason}\r\n"),
        };
        out.extend_from_slice(start_line.as_bytes());

        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.headers.contains("Content-Length") {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.serialize()))
    }
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let mut parts = line.splitn(3, ' ');
    let first = parts
        .next()
        .ok_or_else(|| Error::MalformedStartLine(line.to_string()))?;
    let second = parts
        .next()
        .ok_or_else(|| Error::MalformedStartLine(line.to_string()))?;
    let third = parts
        .next()
        .ok_or_else(|| Error::MalformedStartLine(line.to_string()))?;

    if first.starts_with("SIP/") {
        let status_code = second
            .parse::<u16>()
            .map_err(|_| Error::MalformedStartLine(line.to_string()))?;
        Ok(StartLine::Response {
            version: first.to_string(),
            status_code,
            reason: third.to_string(),
        })
    } else {
        if crate::constants::Method::parse(first).is_none() {
            return Err(Error::UnknownMethod(first.to_string()));
        }
        Ok(StartLine::Request {
            method_token: first.to_string(),
            request_uri: second.to_string(),
            version: third.to_string(),
        })
    }
}

/// Splits a CRLF- or LF-terminated header block into individual lines.
fn split_lines(block: &str) -> impl Iterator<Item = &str> {
    block.split("\r\n").flat_map(|chunk| chunk.split('\n'))
}

/// Finds the `\r\n\r\n` (or bare `\n\n`) terminator and returns
/// `(header_block_len, body_start_offset)`.
fn find_header_terminator(data: &[u8]) -> Option<(usize, usize)> {
    for i in 0..data.len() {
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some((i + 2, i + 4));
        }
        if data[i..].starts_with(b"\n\n") {
            return Some((i + 1, i + 2));
        }
    }
    None
}

/// Scans a header value for `param=` and returns its value, terminating at
/// the next `;`. Used for `tag=` on From/To and `branch=` on Via.
pub fn extract_param<'a>(value: &'a str, param: &str) -> Option<&'a str> {
    let needle = format!("{param}=");
    let idx = value.find(&needle)?;
    let rest = &value[idx + needle.len()..];
    let end = rest.find(';').unwrap_or(rest.len());
    let candidate = rest[..end].trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

/// Scans a From/To header value for a `tag=` parameter.
pub fn extract_tag(value: &str) -> Option<&str> {
    extract_param(value, "tag")
}

/// Extracts the `user@host` portion from a SIP URI-bearing header value
/// (request-URI, or a From/To value such as `"Alice" <sip:alice@host>;tag=x`).
pub fn extract_user_host(value: &str) -> Option<&str> {
    let start = value.find("sip:").map(|i| i + 4).or_else(|| value.find("sips:").map(|i| i + 5))?;
    let rest = &value[start..];
    let end = rest
        .find(|c: char| c == '>' || c == ';' || c == ' ')
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extracts just the user part (before `@`) from a From/To/request-URI value.
pub fn extract_user(value: &str) -> Option<&str> {
    let user_host = extract_user_host(value)?;
    Some(match user_host.find('@') {
        Some(at) => &user_host[..at],
        None => user_host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invite() -> Vec<u8> {
        concat!(
            "INVITE sip:bob@127.0.0.1:5060 SIP/2.0\r\n",
            "Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK776asdhds\r\n",
            "From: \"Alice\" <sip:alice@10.0.0.1>;tag=1928301774\r\n",
            "To: <sip:bob@127.0.0.1>\r\n",
            "Call-ID: c1@10.0.0.1\r\n",
            "CSeq: 1 INVITE\r\n",
            "Content-Type: application/sdp\r\n",
            "Content-Length: 4\r\n",
            "\r\n",
            "body"
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn parses_request_line_and_headers() {
        let msg = SipMessage::parse(&sample_invite()).unwrap();
        assert_eq!(msg.method_token(), Some("INVITE"));
        assert_eq!(msg.call_id(), Some("c1@10.0.0.1"));
        assert_eq!(msg.cseq(), Some((1, "INVITE")));
        assert_eq!(msg.body, b"body");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let msg = SipMessage::parse(&sample_invite()).unwrap();
        assert_eq!(msg.headers.get("call-id"), Some("c1@10.0.0.1"));
        assert_eq!(msg.headers.get("CALL-ID"), Some("c1@10.0.0.1"));
    }

    #[test]
    fn extracts_tag_and_branch() {
        let msg = SipMessage::parse(&sample_invite()).unwrap();
        let from = msg.headers.get("From").unwrap();
        assert_eq!(extract_tag(from), Some("1928301774"));
        assert_eq!(msg.top_via_branch(), Some("z9hG4bK776asdhds"));
    }

    #[test]
    fn folded_header_continuation_joins_with_single_space() {
        let raw = concat!(
            "OPTIONS sip:bob@host SIP/2.0\r\n",
            "Subject: Weekend\r\n",
            " trip plans\r\n",
            "Call-ID: x\r\n",
            "CSeq: 1 OPTIONS\r\n",
            "\r\n"
        );
        let msg = SipMessage::parse(raw.as_bytes()).unwrap();
        assert_eq!(msg.headers.get("Subject"), Some("Weekend trip plans"));
    }

    #[test]
    fn parse_serialize_roundtrip_is_idempotent_with_matching_content_length() {
        let original = sample_invite();
        let msg = SipMessage::parse(&original).unwrap();
        let reserialized = msg.serialize();
        let reparsed = SipMessage::parse(&reserialized).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn serialize_computes_content_length_when_absent() {
        let mut msg = SipMessage::new_response(200, "OK");
        msg.body = b"v=0\r\n".to_vec();
        let bytes = msg.serialize();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 5"));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let raw = "OPTIONS sip:bob@host SIP/2.0\r\nCall-ID: x\r\nCSeq: 1 OPTIONS\r\nContent-Length: 100\r\n\r\nshort";
        let err = SipMessage::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::TruncatedBody { .. }));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let raw = "FROB sip:bob@host SIP/2.0\r\nCall-ID: x\r\nCSeq: 1 FROB\r\n\r\n";
        let err = SipMessage::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));
    }

    #[test]
    fn extracts_user_from_request_uri_and_from_header() {
        let msg = SipMessage::parse(&sample_invite()).unwrap();
        if let StartLine::Request { request_uri, .. } = &msg.start {
            assert_eq!(extract_user(request_uri), Some("bob"));
        } else {
            panic!("expected request");
        }
        assert_eq!(extract_user(msg.headers.get("From").unwrap()), Some("alice"));
    }
}
