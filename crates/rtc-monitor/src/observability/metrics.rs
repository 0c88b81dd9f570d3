//! Per-stream WebRTC metrics.
//!
//! All series follow Prometheus naming conventions:
//! - `webrtc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for the jitter gauge
//!
//! # Cardinality
//!
//! Every series carries two labels:
//! - `ssrc`: one value per inbound stream (a session sees a handful)
//! - `kind`: `audio` or `video`
//!
//! # Registry
//!
//! [`MetricsRegistry`] holds its recorder explicitly instead of installing a
//! process-global one. Handles are registered against that recorder with
//! [`metrics::with_local_recorder`], so tests can run side by side with
//! independent `DebuggingRecorder`s.

use crate::engine::InboundStream;
use crate::sampler::StatsIncrement;
use axum::{routing::get, Router};
use metrics::{counter, gauge, with_local_recorder, Counter, Gauge, Recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::fmt;
use std::sync::Arc;

pub const PACKETS_RECEIVED: &str = "webrtc_packets_received_total";
pub const PACKETS_LOST: &str = "webrtc_packets_lost_total";
pub const BYTES_RECEIVED: &str = "webrtc_bytes_received_total";
pub const HEADER_BYTES_RECEIVED: &str = "webrtc_header_bytes_received_total";
pub const FIR_COUNT: &str = "webrtc_fir_count_total";
pub const PLI_COUNT: &str = "webrtc_pli_count_total";
pub const NACK_COUNT: &str = "webrtc_nack_count_total";
pub const JITTER: &str = "webrtc_jitter_seconds";

/// Build a Prometheus recorder without installing it globally.
///
/// The recorder goes into a [`MetricsRegistry`]; the handle renders the
/// scrape output for [`metrics_router`].
#[must_use]
pub fn prometheus_recorder() -> (PrometheusRecorder, PrometheusHandle) {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// The set of series the sampler writes to.
#[derive(Clone)]
pub struct MetricsRegistry {
    recorder: Arc<dyn Recorder + Send + Sync>,
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self { recorder }
    }

    /// Register (or look up) the series for one inbound stream.
    #[must_use]
    pub fn stream_series(&self, stream: &InboundStream) -> StreamSeries {
        let ssrc = stream.id.ssrc().to_string();
        let kind = stream.kind.as_str();

        with_local_recorder(&*self.recorder, || StreamSeries {
            packets_received: counter!(PACKETS_RECEIVED, "ssrc" => ssrc.clone(), "kind" => kind),
            packets_lost: counter!(PACKETS_LOST, "ssrc" => ssrc.clone(), "kind" => kind),
            bytes_received: counter!(BYTES_RECEIVED, "ssrc" => ssrc.clone(), "kind" => kind),
            header_bytes_received: counter!(
                HEADER_BYTES_RECEIVED,
                "ssrc" => ssrc.clone(),
                "kind" => kind
            ),
            fir_count: counter!(FIR_COUNT, "ssrc" => ssrc.clone(), "kind" => kind),
            pli_count: counter!(PLI_COUNT, "ssrc" => ssrc.clone(), "kind" => kind),
            nack_count: counter!(NACK_COUNT, "ssrc" => ssrc.clone(), "kind" => kind),
            jitter: gauge!(JITTER, "ssrc" => ssrc.clone(), "kind" => kind),
        })
    }
}

/// Handles for one stream's series.
pub struct StreamSeries {
    packets_received: Counter,
    packets_lost: Counter,
    bytes_received: Counter,
    header_bytes_received: Counter,
    fir_count: Counter,
    pli_count: Counter,
    nack_count: Counter,
    jitter: Gauge,
}

impl StreamSeries {
    /// Advance every counter by its increment.
    pub fn add(&self, increment: &StatsIncrement) {
        self.packets_received.increment(increment.packets_received);
        self.packets_lost.increment(increment.packets_lost);
        self.bytes_received.increment(increment.bytes_received);
        self.header_bytes_received
            .increment(increment.header_bytes_received);
        self.fir_count.increment(increment.fir_count);
        self.pli_count.increment(increment.pli_count);
        self.nack_count.increment(increment.nack_count);
    }

    /// Overwrite the jitter gauge.
    pub fn set_jitter(&self, jitter_seconds: f64) {
        self.jitter.set(jitter_seconds);
    }
}
