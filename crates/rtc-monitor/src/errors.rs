//! RTC monitor error types.
//!
//! Every failure the session can hit maps onto one variant here. Whether a
//! failure ends the process is decided by the [`Supervisor`](crate::supervisor::Supervisor),
//! not at the point of detection.

use crate::engine::StreamIdentifier;
use thiserror::Error;

/// RTC monitor error type.
///
/// Error kinds (see [`MonitorError::kind`]):
/// - `Negotiation`: malformed or duplicate description, engine rejected it
/// - `Decode`: malformed transport encoding
/// - `Transport`: signaling exchange network or protocol failure
/// - `StreamRead`: fatal read failure on a stream's sink task
/// - `Engine`: transport engine teardown failure
/// - `Config`, `Metrics`: startup failures
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The engine could not produce or accept a session description.
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Input was not a transport-encoded session description.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The signaling exchange failed.
    #[error("Signaling transport error: {0}")]
    Transport(String),

    /// Reading a stream's payload failed.
    #[error("Stream {stream} read error: {reason}")]
    StreamRead {
        stream: StreamIdentifier,
        reason: String,
    },

    /// The transport engine failed outside of negotiation.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics recorder or exporter error.
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl MonitorError {
    /// Returns a bounded label for logs and policy decisions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            MonitorError::Negotiation(_) => "negotiation",
            MonitorError::Decode(_) => "decode",
            MonitorError::Transport(_) => "transport",
            MonitorError::StreamRead { .. } => "stream_read",
            MonitorError::Engine(_) => "engine",
            MonitorError::Config(_) => "config",
            MonitorError::Metrics(_) => "metrics",
        }
    }

    /// Returns true for errors raised while bringing the session online.
    #[must_use]
    pub const fn is_negotiation_path(&self) -> bool {
        matches!(
            self,
            MonitorError::Negotiation(_) | MonitorError::Decode(_) | MonitorError::Transport(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(MonitorError::Negotiation("x".to_string()).kind(), "negotiation");
        assert_eq!(MonitorError::Decode("x".to_string()).kind(), "decode");
        assert_eq!(MonitorError::Transport("x".to_string()).kind(), "transport");
        assert_eq!(
            MonitorError::StreamRead {
                stream: StreamIdentifier::new(7),
                reason: "eof".to_string()
            }
            .kind(),
            "stream_read"
        );
        assert_eq!(MonitorError::Engine("x".to_string()).kind(), "engine");
        assert_eq!(MonitorError::Config("x".to_string()).kind(), "config");
        assert_eq!(MonitorError::Metrics("x".to_string()).kind(), "metrics");
    }

    #[test]
    fn test_negotiation_path_classification() {
        assert!(MonitorError::Negotiation("dup".to_string()).is_negotiation_path());
        assert!(MonitorError::Decode("bad base64".to_string()).is_negotiation_path());
        assert!(MonitorError::Transport("refused".to_string()).is_negotiation_path());
        assert!(!MonitorError::StreamRead {
            stream: StreamIdentifier::new(1),
            reason: "closed".to_string()
        }
        .is_negotiation_path());
        assert!(!MonitorError::Config("bad".to_string()).is_negotiation_path());
        assert!(!MonitorError::Engine("close failed".to_string()).is_negotiation_path());
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", MonitorError::Transport("connection refused".to_string())),
            "Signaling transport error: connection refused"
        );
        assert_eq!(
            format!(
                "{}",
                MonitorError::StreamRead {
                    stream: StreamIdentifier::new(1234),
                    reason: "EOF".to_string()
                }
            ),
            "Stream 1234 read error: EOF"
        );
    }
}
