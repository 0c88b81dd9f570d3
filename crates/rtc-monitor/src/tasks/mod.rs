//! Background tasks that are not tied to a single stream.
//!
//! # Tasks
//!
//! - `candidate_reporter` - Logs the remote peer's candidates once ICE has left `Checking`

pub mod candidate_reporter;

pub use candidate_reporter::{report_once, start_candidate_reporter};
