//! Session descriptions and their plain-text transport encoding.
//!
//! On the wire a description is the browser's `JSON.stringify(localDescription)`
//! shape, `{"type":"offer","sdp":"v=0..."}`, wrapped in standard base64 so it
//! survives any text channel (HTTP body, copy/paste).

use crate::errors::MonitorError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the exchange a description belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session description: its kind and the opaque SDP text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    #[serde(rename = "sdp")]
    pub payload: String,
}

impl SessionDescription {
    #[must_use]
    pub fn offer(payload: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn answer(payload: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            payload: payload.into(),
        }
    }
}

/// Serialize a description to JSON and base64 it.
///
/// The output is ASCII-only and uses the standard alphabet with padding.
///
/// # Errors
///
/// Returns `MonitorError::Decode` if JSON serialization fails, which only
/// happens on allocator failure for this type.
pub fn encode(description: &SessionDescription) -> Result<String, MonitorError> {
    let json = serde_json::to_vec(description)
        .map_err(|e| MonitorError::Decode(format!("description serialization failed: {e}")))?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode`].
///
/// Surrounding whitespace (a trailing newline from an HTTP body or a pasted
/// line) is ignored.
///
/// # Errors
///
/// Returns `MonitorError::Decode` when the input is not valid base64 or the
/// decoded bytes are not a JSON session description.
pub fn decode(encoded: &str) -> Result<SessionDescription, MonitorError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| MonitorError::Decode(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| MonitorError::Decode(format!("invalid session description: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE_SDP: &str = "v=0\r\no=- 4215 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
        a=group:BUNDLE 0 1\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
        a=candidate:1 1 udp 2130706431 192.168.1.10 50000 typ host\r\n";

    #[test]
    fn test_round_trip_offer_and_answer() {
        for description in [
            SessionDescription::offer(SAMPLE_SDP),
            SessionDescription::answer(SAMPLE_SDP),
            SessionDescription::answer(""),
            SessionDescription::offer("a=unicode-ünïcödé ✓"),
        ] {
            let encoded = encode(&description).unwrap();
            assert_eq!(decode(&encoded).unwrap(), description);
        }
    }

    #[test]
    fn test_encode_is_ascii_base64() {
        let encoded = encode(&SessionDescription::offer("a=ünïcödé\r\n")).unwrap();
        assert!(encoded.is_ascii());
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
        assert_eq!(encoded.len() % 4, 0, "standard base64 is padded");
    }

    #[test]
    fn test_wire_shape_matches_browser_json() {
        let encoded = encode(&SessionDescription::offer("v=0")).unwrap();
        let json = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(json, r#"{"type":"offer","sdp":"v=0"}"#);
    }

    #[test]
    fn test_decode_accepts_browser_output() {
        // btoa(JSON.stringify({type: "answer", sdp: "v=0\r\n"}))
        let encoded = STANDARD.encode(r#"{"type":"answer","sdp":"v=0\r\n"}"#);
        let description = decode(&encoded).unwrap();
        assert_eq!(description.kind, SdpKind::Answer);
        assert_eq!(description.payload, "v=0\r\n");
    }

    #[test]
    fn test_decode_ignores_trailing_newline() {
        let encoded = encode(&SessionDescription::answer("v=0")).unwrap();
        let description = decode(&format!("{encoded}\n")).unwrap();
        assert_eq!(description, SessionDescription::answer("v=0"));
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        let err = decode("not base64 at all!").unwrap_err();
        assert!(matches!(err, MonitorError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_valid_base64_that_is_not_json() {
        let err = decode(&STANDARD.encode("hello")).unwrap_err();
        assert!(matches!(err, MonitorError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let encoded = STANDARD.encode(r#"{"type":"pranswer","sdp":"v=0"}"#);
        assert!(matches!(decode(&encoded), Err(MonitorError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_missing_sdp() {
        let encoded = STANDARD.encode(r#"{"type":"answer"}"#);
        assert!(matches!(decode(&encoded), Err(MonitorError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_input() {
        assert!(matches!(decode(""), Err(MonitorError::Decode(_))));
        assert!(matches!(decode("   \n"), Err(MonitorError::Decode(_))));
    }
}
