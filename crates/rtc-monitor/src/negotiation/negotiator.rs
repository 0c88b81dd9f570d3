//! Session Negotiator.
//!
//! Drives the one-shot offer/answer exchange:
//!
//! 1. create the local offer (starts candidate gathering)
//! 2. optionally wait until gathering completes
//! 3. encode the local description and POST it to the signaling endpoint
//! 4. decode the response and apply it as the remote answer
//!
//! The remote answer is applied at most once per negotiator.

use super::description::{decode, encode, SdpKind, SessionDescription};
use super::signaling::SignalingClient;
use crate::engine::TransportEngine;
use crate::errors::MonitorError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

pub struct SessionNegotiator {
    engine: Arc<dyn TransportEngine>,
    signaling: SignalingClient,
    wait_for_gathering: bool,
    remote_applied: AtomicBool,
}

impl SessionNegotiator {
    #[must_use]
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        signaling: SignalingClient,
        wait_for_gathering: bool,
    ) -> Self {
        Self {
            engine,
            signaling,
            wait_for_gathering,
            remote_applied: AtomicBool::new(false),
        }
    }

    /// Ask the engine for a fresh offer.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Negotiation` if the engine cannot produce one.
    pub async fn create_local_offer(&self) -> Result<SessionDescription, MonitorError> {
        let offer = self.engine.create_offer().await?;
        if offer.kind != SdpKind::Offer {
            return Err(MonitorError::Negotiation(format!(
                "engine produced an {} instead of an offer",
                offer.kind
            )));
        }
        Ok(offer)
    }

    /// Send the encoded offer to the signaling endpoint and return its body.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Transport` if the exchange fails.
    pub async fn exchange(&self, encoded_offer: &str) -> Result<String, MonitorError> {
        self.signaling.exchange(encoded_offer).await
    }

    /// Commit the remote answer to the engine.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Negotiation` if the description is not an
    /// answer, an answer was already applied, or the engine rejects it.
    pub async fn apply_remote(&self, description: SessionDescription) -> Result<(), MonitorError> {
        if description.kind != SdpKind::Answer {
            return Err(MonitorError::Negotiation(format!(
                "expected a remote answer, got an {}",
                description.kind
            )));
        }

        // Claimed before calling the engine; a rejected answer still counts.
        if self
            .remote_applied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(target: "rtc_monitor.negotiator", "Duplicate remote description ignored");
            return Err(MonitorError::Negotiation(
                "remote description already applied".to_string(),
            ));
        }

        self.engine.set_remote_description(description).await
    }

    /// Whether a remote answer has been applied.
    #[must_use]
    pub fn is_remote_applied(&self) -> bool {
        self.remote_applied.load(Ordering::Acquire)
    }

    /// Run the full exchange and return the applied answer.
    ///
    /// # Errors
    ///
    /// Propagates the first `Negotiation`, `Decode` or `Transport` error.
    #[instrument(skip_all, fields(signaling_url = %self.signaling.url()))]
    pub async fn negotiate(&self) -> Result<SessionDescription, MonitorError> {
        let offer = self.create_local_offer().await?;

        if self.wait_for_gathering {
            debug!(target: "rtc_monitor.negotiator", "Waiting for ICE gathering to complete");
            self.engine.wait_for_gathering().await;
        } else {
            warn!(
                target: "rtc_monitor.negotiator",
                "Sending offer before gathering completes; candidate set may be incomplete"
            );
        }

        // The installed description carries the gathered candidates.
        let local = self.engine.local_description().await.unwrap_or(offer);
        let encoded_offer = encode(&local)?;

        let started = Instant::now();
        let encoded_answer = self.exchange(&encoded_offer).await?;
        let round_trip = started.elapsed();

        let answer = decode(&encoded_answer)?;
        self.apply_remote(answer.clone()).await?;

        info!(
            target: "rtc_monitor.negotiator",
            round_trip_ms = u64::try_from(round_trip.as_millis()).unwrap_or(u64::MAX),
            "Remote answer applied"
        );
        Ok(answer)
    }
}
