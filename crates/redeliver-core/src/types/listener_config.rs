//! Listener configuration types
//!
//! These types mirror the YAML configuration surface. Keys are kebab-case,
//! except the free-form consumer properties which keep the broker's own
//! dotted names (`client.id`, `enable.auto.commit`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::client::ClientConfig;
use crate::error::Error;

/// Complete listener configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListenerConfig {
    /// Retry policy applied to every delivery
    #[serde(default)]
    pub retry: RetryPolicyConfig,

    /// Producer send-failure logging
    #[serde(default)]
    pub send_errors: SendErrorLogConfig,

    /// Built-in recovery applied once retries are exhausted
    #[serde(default)]
    pub recovery: RecoveryMode,

    /// Consumer client properties
    #[serde(default)]
    pub consumer: ClientConfig,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicyConfig {
    /// Total number of processing attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Failure kinds that are never retried
    #[serde(default)]
    pub fatal_kinds: Vec<String>,

    /// Add up to 25% random jitter on top of each delay
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffConfig::default(),
            fatal_kinds: Vec::new(),
            jitter: false,
        }
    }
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffConfig {
    #[serde(default)]
    pub kind: BackoffKind,

    /// First delay (exponential) or every delay (fixed), in milliseconds
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    /// Growth factor between consecutive exponential delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any exponential delay, in milliseconds
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::default(),
            initial_interval_ms: default_initial_interval(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_interval() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_interval() -> u64 {
    30000
}

/// Backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// Retry immediately
    None,

    /// Same delay before every retry
    Fixed,

    /// Delay grows by `multiplier` per attempt, capped at `max-interval-ms` (default)
    #[default]
    Exponential,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackoffKind::None => "none",
            BackoffKind::Fixed => "fixed",
            BackoffKind::Exponential => "exponential",
        };
        f.write_str(name)
    }
}

impl FromStr for BackoffKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(BackoffKind::None),
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(Error::invalid_config(format!(
                "unknown backoff kind '{}' (expected none, fixed or exponential)",
                other
            ))),
        }
    }
}

/// Send-failure logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SendErrorLogConfig {
    /// Include the key and payload in the log line
    #[serde(default = "default_include_contents")]
    pub include_contents: bool,

    /// Maximum characters logged for either key or payload
    #[serde(default = "default_max_content_logged")]
    pub max_content_logged: usize,
}

impl Default for SendErrorLogConfig {
    fn default() -> Self {
        Self {
            include_contents: default_include_contents(),
            max_content_logged: default_max_content_logged(),
        }
    }
}

fn default_include_contents() -> bool {
    true
}
fn default_max_content_logged() -> usize {
    100
}

/// Built-in recovery behaviour once retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    /// No recovery: the failure is surfaced to the consumption loop (default)
    #[default]
    None,

    /// Log the message and treat it as handled
    Log,

    /// Acknowledge the message and treat it as handled
    Acknowledge,
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryMode::None => "none",
            RecoveryMode::Log => "log",
            RecoveryMode::Acknowledge => "acknowledge",
        };
        f.write_str(name)
    }
}

impl FromStr for RecoveryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(RecoveryMode::None),
            "log" => Ok(RecoveryMode::Log),
            "acknowledge" | "ack" => Ok(RecoveryMode::Acknowledge),
            other => Err(Error::invalid_config(format!(
                "unknown recovery mode '{}' (expected none, log or acknowledge)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListenerConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff.kind, BackoffKind::Exponential);
        assert_eq!(config.retry.backoff.initial_interval_ms, 1000);
        assert_eq!(config.retry.backoff.max_interval_ms, 30000);
        assert!(config.retry.fatal_kinds.is_empty());
        assert!(config.send_errors.include_contents);
        assert_eq!(config.send_errors.max_content_logged, 100);
        assert_eq!(config.recovery, RecoveryMode::None);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
retry:
  max-attempts: 5
  backoff:
    kind: fixed
recovery: acknowledge
"#;
        let config: ListenerConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff.kind, BackoffKind::Fixed);
        assert_eq!(config.retry.backoff.initial_interval_ms, 1000);
        assert_eq!(config.recovery, RecoveryMode::Acknowledge);
        assert_eq!(config.send_errors, SendErrorLogConfig::default());
    }

    #[test]
    fn test_backoff_kind_from_str() {
        assert_eq!("none".parse::<BackoffKind>().unwrap(), BackoffKind::None);
        assert_eq!(" Fixed ".parse::<BackoffKind>().unwrap(), BackoffKind::Fixed);
        assert_eq!(
            "EXPONENTIAL".parse::<BackoffKind>().unwrap(),
            BackoffKind::Exponential
        );
        assert!("linear".parse::<BackoffKind>().is_err());
    }

    #[test]
    fn test_recovery_mode_round_trips_display() {
        for mode in [RecoveryMode::None, RecoveryMode::Log, RecoveryMode::Acknowledge] {
            assert_eq!(mode.to_string().parse::<RecoveryMode>().unwrap(), mode);
        }
        assert_eq!("ack".parse::<RecoveryMode>().unwrap(), RecoveryMode::Acknowledge);
        assert!("dead-letter".parse::<RecoveryMode>().is_err());
    }
}
