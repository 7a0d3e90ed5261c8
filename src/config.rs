//! Sequence configuration
//!
//! A config is a positive timeout plus the two behaviours callers may want to
//! choose differently: how the idle timer reacts to pushes, and what happens
//! to an error thrown while nobody is waiting.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const TIMEOUT_VAR: &str = "PUSHSEQ_TIMEOUT_MS";
const TIMER_VAR: &str = "PUSHSEQ_TIMER";
const UNOBSERVED_ERROR_VAR: &str = "PUSHSEQ_UNOBSERVED_ERROR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("timeout must be a positive number of milliseconds")]
    ZeroTimeout,

    #[error("invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },

    #[error("unknown idle timer policy: {0}")]
    UnknownTimerPolicy(String),

    #[error("unknown unobserved error policy: {0}")]
    UnknownErrorPolicy(String),

    #[error("invalid sequence config: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the idle timer treats pushed values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdleTimerPolicy {
    /// The first push disarms the timer for good. The timer only guards
    /// against a producer that never sends anything.
    #[default]
    FirstValue,
    /// Fixed deadline from construction. Pushes do not affect it.
    Deadline,
    /// Every push restarts the countdown.
    IdleReset,
}

impl FromStr for IdleTimerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-value" => Ok(Self::FirstValue),
            "deadline" => Ok(Self::Deadline),
            "idle-reset" => Ok(Self::IdleReset),
            other => Err(ConfigError::UnknownTimerPolicy(other.to_string())),
        }
    }
}

/// What happens to an error thrown while no request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnobservedError {
    /// The error is discarded; later requests see a plain end.
    #[default]
    Drop,
    /// The error is kept and raised once, after the buffer drains.
    Deliver,
}

impl FromStr for UnobservedError {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "deliver" => Ok(Self::Deliver),
            other => Err(ConfigError::UnknownErrorPolicy(other.to_string())),
        }
    }
}

/// Configuration for a pushable sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig", into = "RawConfig")]
pub struct SequenceConfig {
    timeout: Duration,
    timer: IdleTimerPolicy,
    unobserved_error: UnobservedError,
}

/// Wire shape: `{"timeoutMs": 50, "timer": "idle-reset", "unobservedError": "drop"}`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    timeout_ms: u64,
    #[serde(default)]
    timer: IdleTimerPolicy,
    #[serde(default)]
    unobserved_error: UnobservedError,
}

impl TryFrom<RawConfig> for SequenceConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.timeout_ms)?
            .with_timer(raw.timer)
            .with_unobserved_error(raw.unobserved_error))
    }
}

impl From<SequenceConfig> for RawConfig {
    fn from(config: SequenceConfig) -> Self {
        Self {
            timeout_ms: u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            timer: config.timer,
            unobserved_error: config.unobserved_error,
        }
    }
}

impl SequenceConfig {
    /// Config with the given timeout and default policies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTimeout`] when `timeout_ms` is zero.
    pub fn new(timeout_ms: u64) -> Result<Self, ConfigError> {
        if timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            timeout: Duration::from_millis(timeout_ms),
            timer: IdleTimerPolicy::default(),
            unobserved_error: UnobservedError::default(),
        })
    }

    #[must_use]
    pub fn with_timer(mut self, timer: IdleTimerPolicy) -> Self {
        self.timer = timer;
        self
    }

    #[must_use]
    pub fn with_unobserved_error(mut self, policy: UnobservedError) -> Self {
        self.unobserved_error = policy;
        self
    }

    /// Parse a JSON config object.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, unknown policy names or a zero timeout.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override `defaults` with `PUSHSEQ_TIMEOUT_MS`, `PUSHSEQ_TIMER` and
    /// `PUSHSEQ_UNOBSERVED_ERROR` when they are set.
    ///
    /// # Errors
    ///
    /// Fails when a set variable does not parse.
    pub fn from_env(defaults: Self) -> Result<Self, ConfigError> {
        Self::from_vars(defaults, |var| std::env::var(var).ok())
    }

    fn from_vars(
        defaults: Self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = defaults;

        if let Some(value) = lookup(TIMEOUT_VAR) {
            let timeout_ms = value.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: TIMEOUT_VAR,
                value: value.clone(),
            })?;
            config = Self::new(timeout_ms)?
                .with_timer(config.timer)
                .with_unobserved_error(config.unobserved_error);
        }
        if let Some(value) = lookup(TIMER_VAR) {
            config.timer = value.trim().parse()?;
        }
        if let Some(value) = lookup(UNOBSERVED_ERROR_VAR) {
            config.unobserved_error = value.trim().parse()?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn timer(&self) -> IdleTimerPolicy {
        self.timer
    }

    #[must_use]
    pub fn unobserved_error(&self) -> UnobservedError {
        self.unobserved_error
    }
}
