//! Tests for per-stream sampler task behavior.
//!
//! Uses tokio's test-util time control features to verify:
//! - The first sample is immediate, later ones follow the interval
//! - Delta vs. snapshot-sum accumulation into the registry
//! - Per-stream cancellation and duplicate announcements
//! - Sink read failures reach the failure channel

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rtc_monitor::engine::{StreamStatsSnapshot, TransportEngine};
use rtc_monitor::observability::metrics::{JITTER, NACK_COUNT, PACKETS_LOST, PACKETS_RECEIVED};
use rtc_monitor::sampler::{AccumulationMode, SamplerSet, StreamSampler};
use rtc_monitor::supervisor::TaskFailure;
use rtc_monitor_test_utils::{audio_stream, packets, video_stream, FakeEngine, TestRegistry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(1);

struct Harness {
    engine: Arc<FakeEngine>,
    metrics: TestRegistry,
    samplers: SamplerSet,
    failures: mpsc::UnboundedReceiver<TaskFailure>,
    session_token: CancellationToken,
}

fn harness(mode: AccumulationMode) -> Harness {
    let (engine, _events) = FakeEngine::new();
    let metrics = TestRegistry::new();
    let (failures_tx, failures) = mpsc::unbounded_channel();
    let session_token = CancellationToken::new();

    let sampler = StreamSampler::new(
        Arc::clone(&engine) as Arc<dyn TransportEngine>,
        Arc::clone(&metrics.registry),
        INTERVAL,
        mode,
        failures_tx,
    );

    Harness {
        engine,
        metrics,
        samplers: SamplerSet::new(sampler, session_token.clone()),
        failures,
        session_token,
    }
}

/// Let spawned tasks run to their next suspension point.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Advance exactly one sampling interval.
async fn tick() {
    tokio::time::advance(INTERVAL).await;
    settle().await;
}

// ============================================================================
// Accumulation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_delta_mode_tracks_cumulative_total() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = audio_stream(1001);
    h.engine.push_stats(stream.id, &[packets(100), packets(150)]);

    assert!(h.samplers.add(stream));

    // First sample is immediate
    settle().await;
    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 1001), Some(100));

    tick().await;
    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 1001), Some(150));

    // Snapshot stays at 150; nothing more is added
    tick().await;
    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 1001), Some(150));

    h.samplers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_sum_mode_adds_each_snapshot() {
    let mut h = harness(AccumulationMode::SnapshotSum);
    let stream = audio_stream(1002);
    h.engine.push_stats(stream.id, &[packets(100), packets(150)]);

    h.samplers.add(stream);
    settle().await;
    tick().await;

    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 1002), Some(250));
    h.samplers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_all_counters_and_jitter_are_published() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = video_stream(1003);
    h.engine.push_stats(
        stream.id,
        &[
            StreamStatsSnapshot {
                packets_received: 10,
                packets_lost: 2,
                nack_count: 1,
                jitter: 0.030,
                ..StreamStatsSnapshot::default()
            },
            StreamStatsSnapshot {
                packets_received: 20,
                packets_lost: 3,
                nack_count: 4,
                jitter: 0.010,
                ..StreamStatsSnapshot::default()
            },
        ],
    );

    h.samplers.add(stream);
    settle().await;
    let first_jitter = h.metrics.gauge(JITTER, 1003).unwrap();
    assert!((first_jitter - 0.030).abs() < 1e-9);

    tick().await;
    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 1003), Some(20));
    assert_eq!(h.metrics.counter(PACKETS_LOST, 1003), Some(3));
    assert_eq!(h.metrics.counter(NACK_COUNT, 1003), Some(4));

    // Jitter is overwritten, not accumulated
    let jitter = h.metrics.gauge(JITTER, 1003).unwrap();
    assert!((jitter - 0.010).abs() < 1e-9, "unexpected jitter {jitter}");

    h.samplers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_streams_publish_independently() {
    let mut h = harness(AccumulationMode::Delta);
    let audio = audio_stream(2001);
    let video = video_stream(2002);
    h.engine.push_stats(audio.id, &[packets(5)]);
    h.engine.push_stats(video.id, &[packets(500)]);

    h.samplers.add(audio);
    h.samplers.add(video);
    settle().await;

    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 2001), Some(5));
    assert_eq!(h.metrics.counter(PACKETS_RECEIVED, 2002), Some(500));
    h.samplers.shutdown().await;
}

// ============================================================================
// Timing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sampling_follows_interval() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = audio_stream(3001);
    h.samplers.add(stream);

    settle().await;
    assert_eq!(h.engine.stats_calls(stream.id), 1);

    // Half an interval: no new sample
    tokio::time::advance(INTERVAL / 2).await;
    settle().await;
    assert_eq!(h.engine.stats_calls(stream.id), 1);

    tokio::time::advance(INTERVAL / 2).await;
    settle().await;
    assert_eq!(h.engine.stats_calls(stream.id), 2);

    for _ in 0..3 {
        tick().await;
    }
    assert_eq!(h.engine.stats_calls(stream.id), 5);

    h.samplers.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_removed_stream_stops_sampling() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = audio_stream(4001);
    h.samplers.add(stream);
    settle().await;
    tick().await;
    let calls = h.engine.stats_calls(stream.id);

    assert!(h.samplers.remove(stream.id));
    assert!(!h.samplers.contains(stream.id));
    settle().await;

    for _ in 0..3 {
        tick().await;
    }
    assert_eq!(h.engine.stats_calls(stream.id), calls);
    assert!(!h.samplers.remove(stream.id), "second removal is a no-op");
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_announcement_is_ignored() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = audio_stream(4002);

    assert!(h.samplers.add(stream));
    assert!(!h.samplers.add(stream));
    assert_eq!(h.samplers.len(), 1);

    // Only one sampler is polling
    settle().await;
    assert_eq!(h.engine.stats_calls(stream.id), 1);
    h.samplers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_session_cancellation_stops_every_stream() {
    let mut h = harness(AccumulationMode::Delta);
    let first = audio_stream(5001);
    let second = video_stream(5002);
    h.samplers.add(first);
    h.samplers.add(second);
    settle().await;

    h.session_token.cancel();
    settle().await;
    let first_calls = h.engine.stats_calls(first.id);
    let second_calls = h.engine.stats_calls(second.id);

    for _ in 0..3 {
        tick().await;
    }
    assert_eq!(h.engine.stats_calls(first.id), first_calls);
    assert_eq!(h.engine.stats_calls(second.id), second_calls);

    h.samplers.shutdown().await;
    assert!(h.samplers.is_empty());
}

// ============================================================================
// Sink failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_read_failure_is_reported() {
    let mut h = harness(AccumulationMode::Delta);
    let stream = audio_stream(6001);
    h.samplers.add(stream);
    settle().await;

    h.engine.fail_reads(stream.id, "track closed");
    settle().await;

    let failure = h.failures.try_recv().expect("failure should be reported");
    assert_eq!(failure.task, "sink");
    assert_eq!(failure.error.kind(), "stream_read");
    assert!(failure.error.to_string().contains("6001"));
    assert!(failure.error.to_string().contains("track closed"));

    // The sampling half keeps running until the session decides
    tick().await;
    assert_eq!(h.engine.stats_calls(stream.id), 2);

    h.samplers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_healthy_streams_report_nothing() {
    let mut h = harness(AccumulationMode::Delta);
    h.samplers.add(audio_stream(6002));
    settle().await;
    for _ in 0..3 {
        tick().await;
    }

    assert!(h.failures.try_recv().is_err());
    h.samplers.shutdown().await;
}
