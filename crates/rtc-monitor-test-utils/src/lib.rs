//! # RTC Monitor Test Utilities
//!
//! Shared test utilities for the RTC monitor.
//!
//! This crate provides:
//! - `FakeEngine`, a scriptable `TransportEngine`
//! - `StubSignaling`, a wiremock signaling responder
//! - `TestRegistry`, a metrics registry whose values can be read back
//! - SDP and stats fixtures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rtc_monitor_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (engine, events) = FakeEngine::new();
//!     let signaling = StubSignaling::answering(&sample_answer()).await;
//!     // build a Session with engine + signaling.url() ...
//! }
//! ```

pub mod fake_engine;
pub mod fixtures;
pub mod metrics;
pub mod mock_signaling;

// Re-export commonly used items
pub use fake_engine::FakeEngine;
pub use fixtures::*;
pub use metrics::TestRegistry;
pub use mock_signaling::StubSignaling;
