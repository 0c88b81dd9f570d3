//! RTC Monitor Library
//!
//! Brings a receive-only WebRTC session online through a single HTTP
//! offer/answer exchange, then samples every inbound stream's statistics into
//! a Prometheus metrics registry.
//!
//! # Architecture
//!
//! ```text
//! main.rs -> session.rs -> negotiation/ (once)
//!                       -> state.rs, sampler/, tasks/ (for the session lifetime)
//!                       -> supervisor.rs (failure policy)
//! engine/ is the transport seam; observability/ owns the metrics registry.
//! ```
//!
//! # Modules
//!
//! - `config` - Configuration from environment
//! - `engine` - Transport engine trait, data types and the `webrtc` adapter
//! - `errors` - Error types and kinds
//! - `negotiation` - Session descriptions, signaling client, negotiator
//! - `observability` - Metrics registry and `/metrics` route
//! - `sampler` - Per-stream sink and sampling tasks
//! - `session` - Startup orchestration and the main control loop
//! - `state` - Connection state tracker
//! - `supervisor` - Abort-or-log failure policy
//! - `tasks` - Candidate reporter

pub mod config;
pub mod engine;
pub mod errors;
pub mod negotiation;
pub mod observability;
pub mod sampler;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod tasks;
