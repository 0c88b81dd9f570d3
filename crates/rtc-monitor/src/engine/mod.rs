//! Transport engine seam.
//!
//! The media transport (codec negotiation, ICE, DTLS/SRTP, interceptors) is a
//! black box behind [`TransportEngine`]. The monitor only drives the offer /
//! answer exchange, drains inbound payload and reads statistics through it.
//!
//! Notifications flow the other way over an unbounded channel of
//! [`EngineEvent`]s so the session loop owns every reaction to them.
//!
//! # Implementations
//!
//! - [`webrtc_adapter::WebRtcEngine`] - production adapter over the `webrtc` crate
//! - `rtc_monitor_test_utils::FakeEngine` - scriptable engine for tests

pub mod reception;
pub mod webrtc_adapter;

use crate::errors::MonitorError;
use crate::negotiation::SessionDescription;
use crate::state::ConnectionState;
use async_trait::async_trait;
use std::fmt;

pub use reception::ReceptionTracker;
pub use webrtc_adapter::{IceServerConfig, WebRtcEngine};

/// Opaque handle for one inbound media stream (the RTP SSRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamIdentifier(u32);

impl StreamIdentifier {
    #[must_use]
    pub const fn new(ssrc: u32) -> Self {
        Self(ssrc)
    }

    #[must_use]
    pub const fn ssrc(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media kind of an inbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Returns the kind as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound stream announced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundStream {
    pub id: StreamIdentifier,
    pub kind: MediaKind,
}

/// Statistics for one inbound stream at one instant.
///
/// Every counter is cumulative since the stream started. `jitter` is the
/// current interarrival jitter in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStatsSnapshot {
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_received: u64,
    pub header_bytes_received: u64,
    pub fir_count: u64,
    pub pli_count: u64,
    pub nack_count: u64,
    pub jitter: f64,
}

/// A network endpoint candidate of the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEndpoint {
    pub address: String,
    pub port: u16,
    /// Candidate type (`host`, `srflx`, `prflx`, `relay`).
    pub candidate_type: String,
}

/// Notification raised by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ConnectionStateChanged(ConnectionState),
    StreamAdded(InboundStream),
    /// The stream ended cleanly. Engines that cannot tell a clean end from a
    /// failure ([`WebRtcEngine`] among them) report a read error instead.
    StreamRemoved(StreamIdentifier),
}

/// Operations the monitor needs from the media transport.
#[async_trait]
pub trait TransportEngine: Send + Sync + 'static {
    /// Create an offer and install it as the local description.
    ///
    /// Installing the description starts local candidate gathering.
    async fn create_offer(&self) -> Result<SessionDescription, MonitorError>;

    /// Resolve once local candidate gathering has completed.
    async fn wait_for_gathering(&self);

    /// The current local description, including gathered candidates.
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply the remote peer's description.
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), MonitorError>;

    /// Read one chunk of raw payload from a stream.
    async fn read_chunk(
        &self,
        stream: StreamIdentifier,
        buf: &mut [u8],
    ) -> Result<usize, MonitorError>;

    /// Current statistics for a stream. Unknown streams yield zeros.
    async fn stream_stats(&self, stream: StreamIdentifier) -> StreamStatsSnapshot;

    /// Remote candidates currently known to the engine.
    async fn remote_candidates(&self) -> Vec<CandidateEndpoint>;

    /// Tear the transport down.
    async fn close(&self) -> Result<(), MonitorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_identifier_display() {
        assert_eq!(StreamIdentifier::new(3_405_691_582).to_string(), "3405691582");
        assert_eq!(StreamIdentifier::new(42).ssrc(), 42);
    }

    #[test]
    fn test_media_kind_labels() {
        assert_eq!(MediaKind::Audio.as_str(), "audio");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }

    #[test]
    fn test_default_snapshot_is_zero() {
        let snapshot = StreamStatsSnapshot::default();
        assert_eq!(snapshot.packets_received, 0);
        assert_eq!(snapshot.nack_count, 0);
        assert!(snapshot.jitter.abs() < f64::EPSILON);
    }
}
