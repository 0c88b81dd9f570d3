//! RTC monitor configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! never reloaded. The TURN credential is held as a `SecretString` and
//! redacted in Debug output.

use crate::engine::IceServerConfig;
use crate::errors::MonitorError;
use crate::sampler::AccumulationMode;
use crate::supervisor::FailurePolicy;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default signaling endpoint the offer is POSTed to.
pub const DEFAULT_SIGNALING_URL: &str = "http://localhost:8080/offer";

/// Default bind address for the `/metrics` endpoint.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default sampling interval in milliseconds.
pub const DEFAULT_STATS_INTERVAL_MS: u64 = 1000;

/// Default STUN server.
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

const SIGNALING_URL: &str = "RTC_MONITOR_SIGNALING_URL";
const METRICS_BIND_ADDRESS: &str = "RTC_MONITOR_METRICS_BIND_ADDRESS";
const STATS_INTERVAL_MS: &str = "RTC_MONITOR_STATS_INTERVAL_MS";
const STUN_URLS: &str = "RTC_MONITOR_STUN_URLS";
const TURN_URL: &str = "RTC_MONITOR_TURN_URL";
const TURN_USERNAME: &str = "RTC_MONITOR_TURN_USERNAME";
const TURN_CREDENTIAL: &str = "RTC_MONITOR_TURN_CREDENTIAL";
const WAIT_FOR_GATHERING: &str = "RTC_MONITOR_WAIT_FOR_GATHERING";
const ACCUMULATION: &str = "RTC_MONITOR_ACCUMULATION";
const STREAM_FAILURE_POLICY: &str = "RTC_MONITOR_STREAM_FAILURE_POLICY";

/// TURN relay settings.
#[derive(Clone)]
pub struct TurnConfig {
    pub url: String,
    pub username: String,
    pub credential: SecretString,
}

impl fmt::Debug for TurnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// RTC monitor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signaling endpoint URL (default: `http://localhost:8080/offer`).
    pub signaling_url: String,

    /// Bind address for the Prometheus endpoint (default: "0.0.0.0:8081").
    pub metrics_bind_address: String,

    /// Interval shared by the stream samplers and the candidate reporter.
    pub stats_interval: Duration,

    /// STUN server URLs. May be empty.
    pub stun_urls: Vec<String>,

    /// Optional TURN relay.
    pub turn: Option<TurnConfig>,

    /// Wait for ICE gathering to finish before sending the offer.
    pub wait_for_gathering: bool,

    /// How cumulative stats are folded into counters.
    pub accumulation: AccumulationMode,

    /// What a stream read failure does to the session.
    pub stream_failure_policy: FailurePolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl From<ConfigError> for MonitorError {
    fn from(err: ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let signaling_url = non_empty(vars, SIGNALING_URL)
            .unwrap_or(DEFAULT_SIGNALING_URL)
            .to_string();
        if !(signaling_url.starts_with("http://") || signaling_url.starts_with("https://")) {
            return Err(invalid(
                SIGNALING_URL,
                format!("must be an http(s) URL, got '{signaling_url}'"),
            ));
        }

        let metrics_bind_address = non_empty(vars, METRICS_BIND_ADDRESS)
            .unwrap_or(DEFAULT_METRICS_BIND_ADDRESS)
            .to_string();

        let stats_interval_ms = match non_empty(vars, STATS_INTERVAL_MS) {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    invalid(
                        STATS_INTERVAL_MS,
                        format!("must be a valid positive integer, got '{value_str}': {e}"),
                    )
                })?;
                if value == 0 {
                    return Err(invalid(STATS_INTERVAL_MS, "must be greater than 0"));
                }
                value
            }
            None => DEFAULT_STATS_INTERVAL_MS,
        };

        let stun_urls = match vars.get(STUN_URLS) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![DEFAULT_STUN_URL.to_string()],
        };

        let turn = match non_empty(vars, TURN_URL) {
            Some(url) => {
                let username = non_empty(vars, TURN_USERNAME)
                    .ok_or_else(|| ConfigError::MissingEnvVar(TURN_USERNAME.to_string()))?;
                let credential = non_empty(vars, TURN_CREDENTIAL)
                    .ok_or_else(|| ConfigError::MissingEnvVar(TURN_CREDENTIAL.to_string()))?;
                Some(TurnConfig {
                    url: url.to_string(),
                    username: username.to_string(),
                    credential: SecretString::from(credential),
                })
            }
            None => None,
        };

        let wait_for_gathering = match non_empty(vars, WAIT_FOR_GATHERING) {
            Some(value_str) => match value_str.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(invalid(
                        WAIT_FOR_GATHERING,
                        format!("must be a boolean, got '{other}'"),
                    ))
                }
            },
            None => true,
        };

        let accumulation = match non_empty(vars, ACCUMULATION) {
            Some(value_str) => value_str
                .parse()
                .map_err(|reason: String| invalid(ACCUMULATION, reason))?,
            None => AccumulationMode::default(),
        };

        let stream_failure_policy = match non_empty(vars, STREAM_FAILURE_POLICY) {
            Some(value_str) => value_str
                .parse()
                .map_err(|reason: String| invalid(STREAM_FAILURE_POLICY, reason))?,
            None => FailurePolicy::default(),
        };

        Ok(Config {
            signaling_url,
            metrics_bind_address,
            stats_interval: Duration::from_millis(stats_interval_ms),
            stun_urls,
            turn,
            wait_for_gathering,
            accumulation,
            stream_failure_policy,
        })
    }

    /// ICE servers for the transport engine: all STUN URLs, then the relay.
    #[must_use]
    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers: Vec<IceServerConfig> = Vec::new();
        if !self.stun_urls.is_empty() {
            servers.push(IceServerConfig {
                urls: self.stun_urls.clone(),
                username: None,
                credential: None,
            });
        }
        if let Some(turn) = &self.turn {
            servers.push(IceServerConfig {
                urls: vec![turn.url.clone()],
                username: Some(turn.username.clone()),
                credential: Some(turn.credential.clone()),
            });
        }
        servers
    }
}
