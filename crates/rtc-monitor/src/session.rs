//! Session orchestration.
//!
//! [`Session::run`] negotiates once, then drives the main control loop:
//!
//! - engine state changes go to the [`ConnectionStateTracker`]
//! - stream announcements start and stop sampler pairs in the [`SamplerSet`]
//! - task failures go to the [`Supervisor`], which may end the session
//!
//! The candidate reporter runs alongside for the life of the session. On
//! exit every task is cancelled and joined before the engine is closed.

use crate::config::Config;
use crate::engine::{EngineEvent, TransportEngine};
use crate::errors::MonitorError;
use crate::negotiation::{SessionNegotiator, SignalingClient};
use crate::observability::MetricsRegistry;
use crate::sampler::{AccumulationMode, SamplerSet, StreamSampler};
use crate::state::ConnectionStateTracker;
use crate::supervisor::{FailurePolicy, Supervisor, TaskFailure};
use crate::tasks::start_candidate_reporter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Runtime knobs for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub stats_interval: Duration,
    pub accumulation: AccumulationMode,
    pub stream_failure_policy: FailurePolicy,
    pub wait_for_gathering: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            accumulation: AccumulationMode::default(),
            stream_failure_policy: FailurePolicy::default(),
            wait_for_gathering: true,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            stats_interval: config.stats_interval,
            accumulation: config.accumulation,
            stream_failure_policy: config.stream_failure_policy,
            wait_for_gathering: config.wait_for_gathering,
        }
    }
}

/// One monitored peer session.
pub struct Session {
    engine: Arc<dyn TransportEngine>,
    negotiator: SessionNegotiator,
    tracker: Arc<ConnectionStateTracker>,
    registry: Arc<MetricsRegistry>,
    supervisor: Supervisor,
    settings: SessionSettings,
}

impl Session {
    #[must_use]
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        signaling: SignalingClient,
        registry: Arc<MetricsRegistry>,
        settings: SessionSettings,
    ) -> Self {
        let negotiator =
            SessionNegotiator::new(Arc::clone(&engine), signaling, settings.wait_for_gathering);
        Self {
            engine,
            negotiator,
            tracker: Arc::new(ConnectionStateTracker::new()),
            registry,
            supervisor: Supervisor::new(settings.stream_failure_policy),
            settings,
        }
    }

    /// The session's connection state, readable while it runs.
    #[must_use]
    pub fn tracker(&self) -> Arc<ConnectionStateTracker> {
        Arc::clone(&self.tracker)
    }

    /// Negotiate, then monitor until `shutdown` fires or a failure aborts.
    ///
    /// # Errors
    ///
    /// Returns the negotiation error, or the first task failure the
    /// supervisor decides to abort on.
    #[instrument(skip_all, name = "rtc_monitor.session")]
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), MonitorError> {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                info!(target: "rtc_monitor.session", "Shutdown requested during negotiation");
                return self.close_engine().await;
            }
            result = self.negotiator.negotiate() => {
                if let Err(e) = result {
                    // Release the transport, but the negotiation error is what matters.
                    let _ = self.close_engine().await;
                    return Err(e);
                }
            }
        }

        let tasks_token = shutdown.child_token();
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<TaskFailure>();

        let mut samplers = SamplerSet::new(
            StreamSampler::new(
                Arc::clone(&self.engine),
                Arc::clone(&self.registry),
                self.settings.stats_interval,
                self.settings.accumulation,
                failures_tx,
            ),
            tasks_token.clone(),
        );

        let reporter = tokio::spawn(start_candidate_reporter(
            Arc::clone(&self.tracker),
            Arc::clone(&self.engine),
            self.settings.stats_interval,
            tasks_token.child_token(),
        ));

        info!(target: "rtc_monitor.session", "Session established, monitoring streams");

        let mut events_open = true;
        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!(target: "rtc_monitor.session", "Shutdown requested");
                    break Ok(());
                }
                Some(failure) = failures_rx.recv() => {
                    match self.supervisor.decide(&failure) {
                        FailurePolicy::Abort => break Err(failure.error),
                        FailurePolicy::Log => {
                            if let MonitorError::StreamRead { stream, .. } = &failure.error {
                                samplers.remove(*stream);
                            }
                        }
                    }
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event, &mut samplers),
                    None => {
                        warn!(target: "rtc_monitor.session", "Engine event channel closed");
                        events_open = false;
                    }
                },
            }
        };

        tasks_token.cancel();
        samplers.shutdown().await;
        if let Err(e) = reporter.await {
            warn!(target: "rtc_monitor.session", error = %e, "Candidate reporter ended abnormally");
        }

        let closed = self.close_engine().await;
        result.and(closed)
    }

    fn handle_event(&self, event: EngineEvent, samplers: &mut SamplerSet) {
        match event {
            EngineEvent::ConnectionStateChanged(state) => {
                self.tracker.publish(state);
            }
            EngineEvent::StreamAdded(stream) => {
                samplers.add(stream);
            }
            EngineEvent::StreamRemoved(stream) => {
                if !samplers.remove(stream) {
                    debug!(
                        target: "rtc_monitor.session",
                        ssrc = stream.ssrc(),
                        "Removal of unknown stream ignored"
                    );
                }
            }
        }
    }

    async fn close_engine(&self) -> Result<(), MonitorError> {
        self.engine.close().await.map_err(|e| {
            warn!(target: "rtc_monitor.session", error = %e, "Engine close failed");
            e
        })
    }
}
