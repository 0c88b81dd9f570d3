//! Connection state tracking.
//!
//! The transport engine reports ICE connection state changes; this module
//! keeps the latest one in a lock-free cell so periodic tasks can decide
//! whether telemetry is meaningful yet.
//!
//! Transitions are not validated. The engine is the only writer and its
//! ordering is trusted; readers may see a value that is one notification
//! stale but never one older than a value already published.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

/// ICE connection state as reported by the transport engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    New = 0,
    Checking = 1,
    Connected = 2,
    Completed = 3,
    Disconnected = 4,
    Failed = 5,
    Closed = 6,
}

impl ConnectionState {
    /// Returns the state as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Checking => "checking",
            ConnectionState::Connected => "connected",
            ConnectionState::Completed => "completed",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Checking,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Completed,
            4 => ConnectionState::Disconnected,
            5 => ConnectionState::Failed,
            6 => ConnectionState::Closed,
            _ => ConnectionState::New,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer, multi-reader cell holding the current connection state.
#[derive(Debug)]
pub struct ConnectionStateTracker {
    state: AtomicU8,
}

impl Default for ConnectionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateTracker {
    /// Create a tracker in the `New` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::New as u8),
        }
    }

    /// Publish a state reported by the engine, returning the previous one.
    pub fn publish(&self, state: ConnectionState) -> ConnectionState {
        let previous = ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            info!(
                target: "rtc_monitor.state",
                from = %previous,
                to = %state,
                "Connection state has changed"
            );
        }
        previous
    }

    /// Read the latest published state.
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ALL_STATES: [ConnectionState; 7] = [
        ConnectionState::New,
        ConnectionState::Checking,
        ConnectionState::Connected,
        ConnectionState::Completed,
        ConnectionState::Disconnected,
        ConnectionState::Failed,
        ConnectionState::Closed,
    ];

    #[test]
    fn test_tracker_starts_new() {
        let tracker = ConnectionStateTracker::new();
        assert_eq!(tracker.current(), ConnectionState::New);
    }

    #[test]
    fn test_publish_returns_previous_state() {
        let tracker = ConnectionStateTracker::new();
        assert_eq!(tracker.publish(ConnectionState::Checking), ConnectionState::New);
        assert_eq!(
            tracker.publish(ConnectionState::Connected),
            ConnectionState::Checking
        );
        assert_eq!(tracker.current(), ConnectionState::Connected);
    }

    #[test]
    fn test_any_transition_is_accepted() {
        // The engine is trusted; even "backwards" moves are recorded as-is.
        let tracker = ConnectionStateTracker::new();
        tracker.publish(ConnectionState::Closed);
        tracker.publish(ConnectionState::Checking);
        assert_eq!(tracker.current(), ConnectionState::Checking);
    }

    #[test]
    fn test_every_state_survives_the_cell() {
        let tracker = ConnectionStateTracker::new();
        for state in ALL_STATES {
            tracker.publish(state);
            assert_eq!(tracker.current(), state);
        }
    }

    #[test]
    fn test_reader_never_observes_older_state() {
        use std::thread;

        let tracker = Arc::new(ConnectionStateTracker::new());
        let order = |s: ConnectionState| match s {
            ConnectionState::New => 0,
            ConnectionState::Checking => 1,
            _ => 2,
        };

        let reader_tracker = Arc::clone(&tracker);
        let reader = thread::spawn(move || {
            let mut highest = 0;
            for _ in 0..10_000 {
                let seen = order(reader_tracker.current());
                assert!(seen >= highest, "observed a state older than one already seen");
                highest = seen;
            }
        });

        tracker.publish(ConnectionState::New);
        tracker.publish(ConnectionState::Checking);
        tracker.publish(ConnectionState::Connected);

        reader.join().expect("Reader thread should complete");
        assert_eq!(tracker.current(), ConnectionState::Connected);
    }

    #[test]
    fn test_display_matches_as_str() {
        for state in ALL_STATES {
            assert_eq!(state.to_string(), state.as_str());
        }
    }
}
