//! [`TransportEngine`] over the `webrtc` crate.
//!
//! The peer connection is receive-only: one audio and one video transceiver
//! are added so the offer advertises both media sections. Remote tracks are
//! registered by SSRC when they arrive and announced as
//! [`EngineEvent::StreamAdded`].
//!
//! `webrtc` has no callback for a remote track ending, so this engine never
//! raises [`EngineEvent::StreamRemoved`]. An ended track surfaces as a
//! `StreamRead` failure from the stream's sink task, and the supervisor's
//! stream failure policy decides what happens next.

use super::{
    CandidateEndpoint, EngineEvent, InboundStream, MediaKind, ReceptionTracker, StreamIdentifier,
    StreamStatsSnapshot, TransportEngine,
};
use crate::errors::MonitorError;
use crate::negotiation::{SdpKind, SessionDescription};
use crate::state::ConnectionState;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::stats::{InboundRTPStats, StatsReportType};
use webrtc::track::track_remote::TrackRemote;

const AUDIO_CLOCK_RATE: u32 = 48_000;
const VIDEO_CLOCK_RATE: u32 = 90_000;

/// One STUN or TURN server handed to the ICE agent.
#[derive(Debug, Clone)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<SecretString>,
}

impl IceServerConfig {
    /// A credential-less server (STUN).
    #[must_use]
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    fn to_rtc(&self) -> RTCIceServer {
        RTCIceServer {
            urls: self.urls.clone(),
            username: self.username.clone().unwrap_or_default(),
            credential: self
                .credential
                .as_ref()
                .map(|c| c.expose_secret().to_string())
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

struct RegisteredTrack {
    track: Arc<TrackRemote>,
    kind: MediaKind,
    // Only the stream's sink task touches this, the lock is never contended.
    reception: Mutex<ReceptionTracker>,
}

type TrackMap = Arc<Mutex<HashMap<StreamIdentifier, Arc<RegisteredTrack>>>>;

/// Production transport engine.
pub struct WebRtcEngine {
    peer_connection: Arc<RTCPeerConnection>,
    tracks: TrackMap,
    gathering: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl WebRtcEngine {
    /// Build the peer connection and wire its callbacks to `events`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Negotiation` if the media engine, interceptors
    /// or peer connection cannot be set up.
    pub async fn new(
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Arc<Self>, MonitorError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| MonitorError::Negotiation(format!("codec registration failed: {e}")))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| MonitorError::Negotiation(format!("interceptor setup failed: {e}")))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(IceServerConfig::to_rtc).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| MonitorError::Negotiation(format!("peer connection failed: {e}")))?,
        );

        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            peer_connection
                .add_transceiver_from_kind(kind, None)
                .await
                .map_err(|e| MonitorError::Negotiation(format!("transceiver setup failed: {e}")))?;
        }

        let tracks: TrackMap = Arc::new(Mutex::new(HashMap::new()));

        let state_events = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |state: RTCIceConnectionState| {
                // A closed receiver means the session loop is gone; nothing to notify.
                let _ = state_events.send(EngineEvent::ConnectionStateChanged(map_ice_state(state)));
                Box::pin(async {})
            },
        ));

        let track_map = Arc::clone(&tracks);
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let id = StreamIdentifier::new(track.ssrc());
            let (kind, clock_rate) = match track.kind() {
                RTPCodecType::Video => (MediaKind::Video, VIDEO_CLOCK_RATE),
                _ => (MediaKind::Audio, AUDIO_CLOCK_RATE),
            };

            let registered = Arc::new(RegisteredTrack {
                track,
                kind,
                reception: Mutex::new(ReceptionTracker::new(clock_rate)),
            });

            let inserted = match track_map.lock() {
                Ok(mut map) => map.insert(id, registered).is_none(),
                Err(_) => false,
            };

            if inserted {
                info!(
                    target: "rtc_monitor.engine",
                    ssrc = id.ssrc(),
                    kind = %kind,
                    "Inbound track registered"
                );
                let _ = events.send(EngineEvent::StreamAdded(InboundStream { id, kind }));
            }
            Box::pin(async {})
        }));

        Ok(Arc::new(Self {
            peer_connection,
            tracks,
            gathering: tokio::sync::Mutex::new(None),
        }))
    }

    fn track(&self, stream: StreamIdentifier) -> Option<Arc<RegisteredTrack>> {
        self.tracks
            .lock()
            .ok()
            .and_then(|map| map.get(&stream).cloned())
    }
}

fn map_ice_state(state: RTCIceConnectionState) -> ConnectionState {
    match state {
        RTCIceConnectionState::Checking => ConnectionState::Checking,
        RTCIceConnectionState::Connected => ConnectionState::Connected,
        RTCIceConnectionState::Completed => ConnectionState::Completed,
        RTCIceConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCIceConnectionState::Failed => ConnectionState::Failed,
        RTCIceConnectionState::Closed => ConnectionState::Closed,
        RTCIceConnectionState::New | RTCIceConnectionState::Unspecified => ConnectionState::New,
    }
}

/// Counters the interceptors report for one inbound SSRC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InboundCounters {
    packets_received: u64,
    bytes_received: u64,
    header_bytes_received: u64,
    nack_count: u64,
    fir_count: u64,
    pli_count: u64,
}

impl From<&InboundRTPStats> for InboundCounters {
    fn from(inbound: &InboundRTPStats) -> Self {
        Self {
            packets_received: inbound.packets_received,
            bytes_received: inbound.bytes_received,
            header_bytes_received: inbound.header_bytes_received,
            nack_count: inbound.nack_count,
            fir_count: inbound.fir_count.unwrap_or_default(),
            pli_count: inbound.pli_count.unwrap_or_default(),
        }
    }
}

/// Combine interceptor counters with locally tracked loss and jitter.
fn merge_stats(
    counters: InboundCounters,
    reception: &mut ReceptionTracker,
) -> StreamStatsSnapshot {
    StreamStatsSnapshot {
        // Interceptor stats lag the reads slightly; never report fewer than were read.
        packets_received: counters.packets_received.max(reception.packets_received()),
        packets_lost: reception.cumulative_lost(),
        bytes_received: counters.bytes_received,
        header_bytes_received: counters.header_bytes_received,
        fir_count: counters.fir_count,
        pli_count: counters.pli_count,
        nack_count: counters.nack_count,
        jitter: reception.jitter_seconds(),
    }
}

fn from_rtc(description: RTCSessionDescription) -> SessionDescription {
    use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

    match description.sdp_type {
        RTCSdpType::Offer => SessionDescription::offer(description.sdp),
        _ => SessionDescription::answer(description.sdp),
    }
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription, MonitorError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| MonitorError::Negotiation(format!("offer creation failed: {e}")))?;

        // Subscribe before gathering starts so completion cannot be missed.
        *self.gathering.lock().await = Some(self.peer_connection.gathering_complete_promise().await);

        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| MonitorError::Negotiation(format!("local description rejected: {e}")))?;

        Ok(from_rtc(offer))
    }

    async fn wait_for_gathering(&self) {
        let promise = self.gathering.lock().await.take();
        if let Some(mut promise) = promise {
            let _ = promise.recv().await;
            debug!(target: "rtc_monitor.engine", "ICE gathering complete");
        }
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.peer_connection.local_description().await.map(from_rtc)
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), MonitorError> {
        let rtc = match description.kind {
            SdpKind::Answer => RTCSessionDescription::answer(description.payload),
            SdpKind::Offer => RTCSessionDescription::offer(description.payload),
        }
        .map_err(|e| MonitorError::Negotiation(format!("malformed remote description: {e}")))?;

        self.peer_connection
            .set_remote_description(rtc)
            .await
            .map_err(|e| MonitorError::Negotiation(format!("remote description rejected: {e}")))
    }

    async fn read_chunk(
        &self,
        stream: StreamIdentifier,
        buf: &mut [u8],
    ) -> Result<usize, MonitorError> {
        let registered = self.track(stream).ok_or_else(|| MonitorError::StreamRead {
            stream,
            reason: "unknown stream".to_string(),
        })?;

        let (packet, _) = registered
            .track
            .read(buf)
            .await
            .map_err(|e| MonitorError::StreamRead {
                stream,
                reason: e.to_string(),
            })?;

        if let Ok(mut reception) = registered.reception.lock() {
            reception.process_packet(
                packet.header.sequence_number,
                packet.header.timestamp,
                Instant::now(),
            );
        }

        Ok(packet.payload.len())
    }

    async fn stream_stats(&self, stream: StreamIdentifier) -> StreamStatsSnapshot {
        let Some(registered) = self.track(stream) else {
            return StreamStatsSnapshot::default();
        };

        let report = self.peer_connection.get_stats().await;
        let counters = report
            .reports
            .values()
            .find_map(|entry| match entry {
                StatsReportType::InboundRTP(inbound) if inbound.ssrc == stream.ssrc() => {
                    Some(InboundCounters::from(inbound))
                }
                _ => None,
            })
            .unwrap_or_default();

        let snapshot = {
            let mut reception = registered
                .reception
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            merge_stats(counters, &mut reception)
        };

        debug!(
            target: "rtc_monitor.engine",
            ssrc = stream.ssrc(),
            kind = %registered.kind,
            packets_received = snapshot.packets_received,
            "Collected stream stats"
        );
        snapshot
    }

    async fn remote_candidates(&self) -> Vec<CandidateEndpoint> {
        let report = self.peer_connection.get_stats().await;
        let mut candidates: Vec<CandidateEndpoint> = report
            .reports
            .values()
            .filter_map(|entry| match entry {
                StatsReportType::RemoteCandidate(candidate) => Some(CandidateEndpoint {
                    address: candidate.ip.clone(),
                    port: candidate.port,
                    candidate_type: candidate.candidate_type.to_string(),
                }),
                _ => None,
            })
            .collect();
        candidates.sort_by(|a, b| (&a.address, a.port).cmp(&(&b.address, b.port)));
        candidates
    }

    async fn close(&self) -> Result<(), MonitorError> {
        if let Ok(mut map) = self.tracks.lock() {
            map.clear();
        }
        self.peer_connection.close().await.map_err(|e| {
            warn!(target: "rtc_monitor.engine", error = %e, "Peer connection close failed");
            MonitorError::Engine(format!("peer connection close failed: {e}"))
        })
    }
}
