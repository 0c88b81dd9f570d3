//! Stream Stats Sampler.
//!
//! Every inbound stream gets a pair of tasks:
//!
//! - **sink**: drains the stream's payload so the engine never stalls on a
//!   full receive buffer. A read error is reported to the supervisor and the
//!   sink exits.
//! - **sampler**: on a fixed interval, pulls the stream's statistics and
//!   republishes them to the [`MetricsRegistry`].
//!
//! The pair shares a [`CancellationToken`] derived from the session token,
//! held in a [`StreamTaskHandle`]. [`SamplerSet`] owns the handles and tears
//! a pair down when its stream goes away or the session ends.

pub mod accumulator;

pub use accumulator::{AccumulationMode, StatsAccumulator, StatsIncrement};

use crate::engine::{InboundStream, StreamIdentifier, TransportEngine};
use crate::observability::{MetricsRegistry, StreamSeries};
use crate::supervisor::TaskFailure;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Size of the sink task's read buffer (one MTU-sized packet).
pub const READ_BUFFER_SIZE: usize = 1500;

/// Spawns sink and sampling tasks for new streams.
#[derive(Clone)]
pub struct StreamSampler {
    engine: Arc<dyn TransportEngine>,
    registry: Arc<MetricsRegistry>,
    interval: Duration,
    mode: AccumulationMode,
    failures: mpsc::UnboundedSender<TaskFailure>,
}

impl StreamSampler {
    #[must_use]
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        registry: Arc<MetricsRegistry>,
        interval: Duration,
        mode: AccumulationMode,
        failures: mpsc::UnboundedSender<TaskFailure>,
    ) -> Self {
        Self {
            engine,
            registry,
            interval,
            mode,
            failures,
        }
    }

    /// Start the task pair for `stream`, cancelled with `parent`.
    #[must_use]
    pub fn spawn(&self, stream: InboundStream, parent: &CancellationToken) -> StreamTaskHandle {
        let cancel_token = parent.child_token();

        let sink = tokio::spawn(run_sink(
            Arc::clone(&self.engine),
            stream.id,
            self.failures.clone(),
            cancel_token.clone(),
        ));

        let sampler = tokio::spawn(run_sampling(
            Arc::clone(&self.engine),
            stream.id,
            self.registry.stream_series(&stream),
            StatsAccumulator::new(self.mode),
            self.interval,
            cancel_token.clone(),
        ));

        info!(
            target: "rtc_monitor.sampler",
            ssrc = stream.id.ssrc(),
            kind = %stream.kind,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            mode = %self.mode,
            "Started stream tasks"
        );

        StreamTaskHandle {
            stream,
            cancel_token,
            sink,
            sampler,
        }
    }
}

/// Drain a stream's payload until cancelled or a read fails.
#[instrument(skip_all, name = "rtc_monitor.sampler.sink", fields(ssrc = stream.ssrc()))]
pub async fn run_sink(
    engine: Arc<dyn TransportEngine>,
    stream: StreamIdentifier,
    failures: mpsc::UnboundedSender<TaskFailure>,
    cancel_token: CancellationToken,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                debug!(target: "rtc_monitor.sampler", ssrc = stream.ssrc(), "Sink task cancelled");
                break;
            }
            result = engine.read_chunk(stream, &mut buf) => {
                if let Err(e) = result {
                    warn!(
                        target: "rtc_monitor.sampler",
                        ssrc = stream.ssrc(),
                        error = %e,
                        "Stream read failed"
                    );
                    // The session may already be gone during shutdown.
                    let _ = failures.send(TaskFailure::new("sink", e));
                    break;
                }
            }
        }
    }
}

/// Publish one stream's statistics every `interval` until cancelled.
///
/// The first sample is taken immediately. Ticks missed while the runtime was
/// busy are skipped rather than replayed.
#[instrument(skip_all, name = "rtc_monitor.sampler.stats", fields(ssrc = stream.ssrc()))]
pub async fn run_sampling(
    engine: Arc<dyn TransportEngine>,
    stream: StreamIdentifier,
    series: StreamSeries,
    mut accumulator: StatsAccumulator,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                debug!(target: "rtc_monitor.sampler", ssrc = stream.ssrc(), "Sampling task cancelled");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = engine.stream_stats(stream).await;
                series.add(&accumulator.next(&snapshot));
                series.set_jitter(snapshot.jitter);
            }
        }
    }
}

/// Cancellation and join handles for one stream's task pair.
pub struct StreamTaskHandle {
    stream: InboundStream,
    cancel_token: CancellationToken,
    sink: JoinHandle<()>,
    sampler: JoinHandle<()>,
}

impl StreamTaskHandle {
    #[must_use]
    pub fn stream(&self) -> InboundStream {
        self.stream
    }

    /// Signal both tasks to stop without waiting for them.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// True once both tasks have exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sink.is_finished() && self.sampler.is_finished()
    }

    /// Cancel both tasks and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        for (name, handle) in [("sink", self.sink), ("sampler", self.sampler)] {
            if let Err(e) = handle.await {
                warn!(
                    target: "rtc_monitor.sampler",
                    ssrc = self.stream.id.ssrc(),
                    task = name,
                    error = %e,
                    "Stream task ended abnormally"
                );
            }
        }
    }
}

/// The live task pairs, keyed by stream.
pub struct SamplerSet {
    sampler: StreamSampler,
    parent: CancellationToken,
    streams: HashMap<StreamIdentifier, StreamTaskHandle>,
}

impl SamplerSet {
    #[must_use]
    pub fn new(sampler: StreamSampler, parent: CancellationToken) -> Self {
        Self {
            sampler,
            parent,
            streams: HashMap::new(),
        }
    }

    /// Start tasks for a newly announced stream.
    ///
    /// Returns false, leaving the running pair untouched, when the stream
    /// already has live tasks.
    pub fn add(&mut self, stream: InboundStream) -> bool {
        if let Some(existing) = self.streams.get(&stream.id) {
            if !existing.is_cancelled() {
                warn!(
                    target: "rtc_monitor.sampler",
                    ssrc = stream.id.ssrc(),
                    "Duplicate stream announcement ignored"
                );
                return false;
            }
        }

        let handle = self.sampler.spawn(stream, &self.parent);
        self.streams.insert(stream.id, handle);
        true
    }

    /// Stop a stream's tasks. Returns false for an unknown stream.
    pub fn remove(&mut self, stream: StreamIdentifier) -> bool {
        match self.streams.remove(&stream) {
            Some(handle) => {
                handle.cancel();
                info!(target: "rtc_monitor.sampler", ssrc = stream.ssrc(), "Stopped stream tasks");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, stream: StreamIdentifier) -> bool {
        self.streams.contains_key(&stream)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Cancel every pair and wait for all of them.
    pub async fn shutdown(&mut self) {
        let handles: Vec<StreamTaskHandle> = self.streams.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
