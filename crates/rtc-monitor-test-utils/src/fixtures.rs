//! Canned SDP and stats values.

use rtc_monitor::engine::{
    CandidateEndpoint, InboundStream, MediaKind, StreamIdentifier, StreamStatsSnapshot,
};
use rtc_monitor::negotiation::SessionDescription;

/// Offer produced by `FakeEngine::create_offer`, before gathering.
pub const OFFER_SDP: &str = "v=0\r\n\
o=- 6190432021535040000 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=recvonly\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=recvonly\r\n\
a=rtpmap:96 VP8/90000\r\n";

/// Appended to the local description once gathering completes.
pub const GATHERED_CANDIDATES: &str =
    "a=candidate:1 1 udp 2130706431 192.168.1.20 54321 typ host\r\na=end-of-candidates\r\n";

/// Answer returned by the stub signaling responder.
pub const ANSWER_SDP: &str = "v=0\r\n\
o=- 4215775240449105457 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=sendonly\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=candidate:1 1 udp 2130706431 203.0.113.7 40000 typ host\r\n";

pub fn sample_answer() -> SessionDescription {
    SessionDescription::answer(ANSWER_SDP)
}

pub fn audio_stream(ssrc: u32) -> InboundStream {
    InboundStream {
        id: StreamIdentifier::new(ssrc),
        kind: MediaKind::Audio,
    }
}

pub fn video_stream(ssrc: u32) -> InboundStream {
    InboundStream {
        id: StreamIdentifier::new(ssrc),
        kind: MediaKind::Video,
    }
}

/// Snapshot with only `packets_received` set.
pub fn packets(received: u64) -> StreamStatsSnapshot {
    StreamStatsSnapshot {
        packets_received: received,
        ..StreamStatsSnapshot::default()
    }
}

pub fn host_candidate(address: &str, port: u16) -> CandidateEndpoint {
    CandidateEndpoint {
        address: address.to_string(),
        port,
        candidate_type: "host".to_string(),
    }
}
