//! Top-level failure policy.
//!
//! Background tasks never decide their own fate. They report a
//! [`TaskFailure`] and exit; the session loop asks the [`Supervisor`]
//! whether the failure ends the process ([`FailurePolicy::Abort`]) or only
//! the task that raised it ([`FailurePolicy::Log`]).
//!
//! The default is crash-only: every failure aborts.

use crate::errors::MonitorError;
use std::fmt;
use std::str::FromStr;
use tracing::{error, warn};

/// What to do with a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the session and return the error to `main`.
    #[default]
    Abort,
    /// Log the error and stop only the failing task.
    Log,
}

impl FailurePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Log => "log",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "log" => Ok(FailurePolicy::Log),
            other => Err(format!("expected 'abort' or 'log', got '{other}'")),
        }
    }
}

/// A failure reported by a background task.
#[derive(Debug)]
pub struct TaskFailure {
    /// Task name for logs (`sink`, `sampler`, ...).
    pub task: &'static str,
    pub error: MonitorError,
}

impl TaskFailure {
    #[must_use]
    pub fn new(task: &'static str, error: MonitorError) -> Self {
        Self { task, error }
    }
}

/// Maps failures to a [`FailurePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Supervisor {
    stream_failure_policy: FailurePolicy,
}

impl Supervisor {
    #[must_use]
    pub fn new(stream_failure_policy: FailurePolicy) -> Self {
        Self {
            stream_failure_policy,
        }
    }

    /// Policy for an error, without side effects.
    #[must_use]
    pub fn policy_for(&self, error: &MonitorError) -> FailurePolicy {
        match error {
            MonitorError::StreamRead { .. } => self.stream_failure_policy,
            _ => FailurePolicy::Abort,
        }
    }

    /// Decide on a task failure and log the outcome.
    #[must_use]
    pub fn decide(&self, failure: &TaskFailure) -> FailurePolicy {
        let policy = self.policy_for(&failure.error);
        match policy {
            FailurePolicy::Abort => error!(
                target: "rtc_monitor.supervisor",
                task = failure.task,
                kind = failure.error.kind(),
                error = %failure.error,
                "Fatal task failure, aborting session"
            ),
            FailurePolicy::Log => warn!(
                target: "rtc_monitor.supervisor",
                task = failure.task,
                kind = failure.error.kind(),
                error = %failure.error,
                "Task failed, continuing without it"
            ),
        }
        policy
    }
}
