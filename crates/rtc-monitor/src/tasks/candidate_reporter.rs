//! Candidate Reporter background task.
//!
//! On the sampling interval, surfaces the remote peer's network candidates.
//! Nothing is reported while ICE is still `Checking`: the candidate list is
//! in flux and the selected pair is not meaningful yet. The task is purely
//! observational and never feeds back into the session.

use crate::engine::{CandidateEndpoint, TransportEngine};
use crate::state::{ConnectionState, ConnectionStateTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Candidates to report for one tick.
pub async fn report_once(
    tracker: &ConnectionStateTracker,
    engine: &dyn TransportEngine,
) -> Vec<CandidateEndpoint> {
    if tracker.current() == ConnectionState::Checking {
        return Vec::new();
    }
    engine.remote_candidates().await
}

/// Run the reporter until `cancel_token` fires.
#[instrument(skip_all, name = "rtc_monitor.task.candidate_reporter")]
pub async fn start_candidate_reporter(
    tracker: Arc<ConnectionStateTracker>,
    engine: Arc<dyn TransportEngine>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "rtc_monitor.task.candidate_reporter",
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "Starting candidate reporter task"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                info!(
                    target: "rtc_monitor.task.candidate_reporter",
                    "Candidate reporter received shutdown signal, exiting"
                );
                break;
            }
            _ = ticker.tick() => {
                for candidate in report_once(&tracker, engine.as_ref()).await {
                    info!(
                        target: "rtc_monitor.task.candidate_reporter",
                        address = %candidate.address,
                        port = candidate.port,
                        candidate_type = %candidate.candidate_type,
                        "remote candidate"
                    );
                }
            }
        }
    }
}
