//! Scriptable in-memory transport engine.
//!
//! `FakeEngine` implements `TransportEngine` without any networking:
//!
//! - offers are fixed SDP text; gathering appends host candidates to the
//!   local description, so tests can tell whether the offer was sent early
//! - stats are queued per stream and consumed one per `stream_stats` call
//!   (the last one sticks once the queue drains)
//! - reads block until the test injects a failure for that stream
//! - events are pushed onto the same channel the session consumes

use crate::fixtures::{GATHERED_CANDIDATES, OFFER_SDP};
use async_trait::async_trait;
use rtc_monitor::engine::{
    CandidateEndpoint, EngineEvent, InboundStream, StreamIdentifier, StreamStatsSnapshot,
    TransportEngine,
};
use rtc_monitor::errors::MonitorError;
use rtc_monitor::negotiation::SessionDescription;
use rtc_monitor::state::ConnectionState;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

#[derive(Default)]
struct Inner {
    offer_failure: Option<String>,
    remote_rejection: Option<String>,
    close_failure: Option<String>,
    local_description: Option<SessionDescription>,
    remote_descriptions: Vec<SessionDescription>,
    queued_stats: HashMap<StreamIdentifier, VecDeque<StreamStatsSnapshot>>,
    last_stats: HashMap<StreamIdentifier, StreamStatsSnapshot>,
    stats_calls: HashMap<StreamIdentifier, usize>,
    candidates: Vec<CandidateEndpoint>,
    closed: bool,
}

/// Scriptable `TransportEngine` for tests.
pub struct FakeEngine {
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<EngineEvent>,
    read_failures: watch::Sender<HashMap<StreamIdentifier, String>>,
    gathering_waits: AtomicUsize,
    candidate_queries: AtomicUsize,
}

impl FakeEngine {
    /// Create an engine and the event receiver a session consumes.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (read_failures, _) = watch::channel(HashMap::new());
        let engine = Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            events,
            read_failures,
            gathering_waits: AtomicUsize::new(0),
            candidate_queries: AtomicUsize::new(0),
        });
        (engine, events_rx)
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("fake engine lock poisoned")
    }

    // ---- scripting -------------------------------------------------------

    /// Make `create_offer` fail.
    pub fn fail_offer(&self, reason: &str) {
        self.inner().offer_failure = Some(reason.to_string());
    }

    /// Make `set_remote_description` fail.
    pub fn reject_remote(&self, reason: &str) {
        self.inner().remote_rejection = Some(reason.to_string());
    }

    /// Make `close` fail (the engine still counts as closed).
    pub fn fail_close(&self, reason: &str) {
        self.inner().close_failure = Some(reason.to_string());
    }

    /// Queue snapshots returned by successive `stream_stats` calls.
    pub fn push_stats(&self, stream: StreamIdentifier, snapshots: &[StreamStatsSnapshot]) {
        self.inner()
            .queued_stats
            .entry(stream)
            .or_default()
            .extend(snapshots.iter().copied());
    }

    /// Fail every pending and future read on `stream`.
    pub fn fail_reads(&self, stream: StreamIdentifier, reason: &str) {
        self.read_failures.send_modify(|failures| {
            failures.insert(stream, reason.to_string());
        });
    }

    pub fn set_candidates(&self, candidates: Vec<CandidateEndpoint>) {
        self.inner().candidates = candidates;
    }

    /// Raise a connection state notification.
    pub fn emit_state(&self, state: ConnectionState) {
        self.emit(EngineEvent::ConnectionStateChanged(state));
    }

    /// Announce a new inbound stream.
    pub fn add_stream(&self, stream: InboundStream) {
        self.emit(EngineEvent::StreamAdded(stream));
    }

    /// Announce the end of a stream.
    pub fn remove_stream(&self, stream: StreamIdentifier) {
        self.emit(EngineEvent::StreamRemoved(stream));
    }

    fn emit(&self, event: EngineEvent) {
        self.events
            .send(event)
            .expect("session event receiver dropped");
    }

    // ---- inspection ------------------------------------------------------

    pub fn gathering_waits(&self) -> usize {
        self.gathering_waits.load(Ordering::SeqCst)
    }

    pub fn candidate_queries(&self) -> usize {
        self.candidate_queries.load(Ordering::SeqCst)
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.inner().remote_descriptions.clone()
    }

    pub fn stats_calls(&self, stream: StreamIdentifier) -> usize {
        self.inner().stats_calls.get(&stream).copied().unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }
}

#[async_trait]
impl TransportEngine for FakeEngine {
    async fn create_offer(&self) -> Result<SessionDescription, MonitorError> {
        let mut inner = self.inner();
        if let Some(reason) = &inner.offer_failure {
            return Err(MonitorError::Negotiation(reason.clone()));
        }
        let offer = SessionDescription::offer(OFFER_SDP);
        inner.local_description = Some(offer.clone());
        Ok(offer)
    }

    async fn wait_for_gathering(&self) {
        self.gathering_waits.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner();
        if let Some(local) = inner.local_description.as_mut() {
            local.payload.push_str(GATHERED_CANDIDATES);
        }
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.inner().local_description.clone()
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), MonitorError> {
        let mut inner = self.inner();
        inner.remote_descriptions.push(description);
        match &inner.remote_rejection {
            Some(reason) => Err(MonitorError::Negotiation(reason.clone())),
            None => Ok(()),
        }
    }

    async fn read_chunk(
        &self,
        stream: StreamIdentifier,
        _buf: &mut [u8],
    ) -> Result<usize, MonitorError> {
        let mut failures = self.read_failures.subscribe();
        loop {
            if let Some(reason) = failures.borrow_and_update().get(&stream) {
                return Err(MonitorError::StreamRead {
                    stream,
                    reason: reason.clone(),
                });
            }
            if failures.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn stream_stats(&self, stream: StreamIdentifier) -> StreamStatsSnapshot {
        let mut inner = self.inner();
        *inner.stats_calls.entry(stream).or_default() += 1;
        let next = inner
            .queued_stats
            .get_mut(&stream)
            .and_then(VecDeque::pop_front);
        match next {
            Some(snapshot) => {
                inner.last_stats.insert(stream, snapshot);
                snapshot
            }
            None => inner.last_stats.get(&stream).copied().unwrap_or_default(),
        }
    }

    async fn remote_candidates(&self) -> Vec<CandidateEndpoint> {
        self.candidate_queries.fetch_add(1, Ordering::SeqCst);
        self.inner().candidates.clone()
    }

    async fn close(&self) -> Result<(), MonitorError> {
        let mut inner = self.inner();
        inner.closed = true;
        match &inner.close_failure {
            Some(reason) => Err(MonitorError::Engine(reason.clone())),
            None => Ok(()),
        }
    }
}
