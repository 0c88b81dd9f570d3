//! Registry backed by a `DebuggingRecorder`, with value lookups.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rtc_monitor::observability::MetricsRegistry;
use std::sync::Arc;

/// A registry whose values can be read back in tests.
pub struct TestRegistry {
    pub registry: Arc<MetricsRegistry>,
    snapshotter: Snapshotter,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRegistry {
    pub fn new() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        Self {
            registry: Arc::new(MetricsRegistry::new(Arc::new(recorder))),
            snapshotter,
        }
    }

    fn find(&self, name: &str, ssrc: u32) -> Option<DebugValue> {
        let ssrc = ssrc.to_string();
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| {
                key.key().name() == name
                    && key
                        .key()
                        .labels()
                        .any(|label| label.key() == "ssrc" && label.value() == ssrc)
            })
            .map(|(_, _, _, value)| value)
    }

    /// Counter value for a stream's series, if registered.
    pub fn counter(&self, name: &str, ssrc: u32) -> Option<u64> {
        match self.find(name, ssrc) {
            Some(DebugValue::Counter(value)) => Some(value),
            _ => None,
        }
    }

    /// Gauge value for a stream's series, if registered.
    pub fn gauge(&self, name: &str, ssrc: u32) -> Option<f64> {
        match self.find(name, ssrc) {
            Some(DebugValue::Gauge(value)) => Some(value.into_inner()),
            _ => None,
        }
    }
}
