//! Immutable retry policy
//!
//! A [`RetryPolicy`] answers two questions for the executor: may this failed
//! attempt be retried, and how long to wait before the next one. It holds no
//! per-delivery state, so one instance can be shared by every partition's
//! consumption loop.

use std::collections::BTreeSet;
use std::time::Duration;

use super::error::RetryError;
use super::failure::FailureKind;
use super::strategies::{calculate_delay, FailureClass};
use crate::types::{BackoffConfig, BackoffKind, RetryPolicyConfig};

/// Delay between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Retry immediately
    None,

    /// Same delay before every retry
    Fixed { interval: Duration },

    /// `min(initial * multiplier^(attempt-1), max)`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    pub fn fixed(interval: Duration) -> Self {
        Backoff::Fixed { interval }
    }

    /// Exponential backoff; rejects a multiplier below 1.0 or a cap below
    /// the initial interval
    pub fn exponential(
        initial: Duration,
        multiplier: f64,
        max: Duration,
    ) -> Result<Self, RetryError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(RetryError::invalid_policy(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                multiplier
            )));
        }
        if max < initial {
            return Err(RetryError::invalid_policy(format!(
                "backoff max interval ({}ms) is below the initial interval ({}ms)",
                max.as_millis(),
                initial.as_millis()
            )));
        }
        Ok(Backoff::Exponential {
            initial,
            multiplier,
            max,
        })
    }

    pub fn from_config(config: &BackoffConfig) -> Result<Self, RetryError> {
        match config.kind {
            BackoffKind::None => Ok(Backoff::None),
            BackoffKind::Fixed => Ok(Backoff::fixed(Duration::from_millis(
                config.initial_interval_ms,
            ))),
            BackoffKind::Exponential => Backoff::exponential(
                Duration::from_millis(config.initial_interval_ms),
                config.multiplier,
                Duration::from_millis(config.max_interval_ms),
            ),
        }
    }

    pub fn kind(&self) -> BackoffKind {
        match self {
            Backoff::None => BackoffKind::None,
            Backoff::Fixed { .. } => BackoffKind::Fixed,
            Backoff::Exponential { .. } => BackoffKind::Exponential,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_millis(1000),
            multiplier: 2.0,
            max: Duration::from_millis(30000),
        }
    }
}

/// Bounded retry policy for one message delivery
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use redeliver_core::retry::{Backoff, ListenerError, RetryPolicy};
///
/// let policy = RetryPolicy::new(3)
///     .unwrap()
///     .with_backoff(Backoff::fixed(Duration::from_millis(500)))
///     .with_fatal_kind("schema-mismatch");
///
/// let timeout = ListenerError::transient("timeout", "slow");
/// assert!(policy.should_retry(&timeout, 1));
/// assert!(policy.should_retry(&timeout, 2));
/// assert!(!policy.should_retry(&timeout, 3));
///
/// let mismatch = ListenerError::transient("schema-mismatch", "v3 payload");
/// assert!(!policy.should_retry(&mismatch, 1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    fatal_kinds: BTreeSet<String>,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            fatal_kinds: BTreeSet::new(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` total attempts with default backoff
    pub fn new(max_attempts: u32) -> Result<Self, RetryError> {
        if max_attempts == 0 {
            return Err(RetryError::invalid_policy("max-attempts must be at least 1"));
        }
        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// Build and validate a policy from configuration
    pub fn from_config(config: &RetryPolicyConfig) -> Result<Self, RetryError> {
        let policy = Self::new(config.max_attempts)?
            .with_backoff(Backoff::from_config(&config.backoff)?)
            .with_fatal_kinds(config.fatal_kinds.iter().cloned())
            .with_jitter(config.jitter);
        Ok(policy)
    }

    /// Render the policy back into its configuration form
    pub fn to_config(&self) -> RetryPolicyConfig {
        let defaults = BackoffConfig::default();
        let backoff = match &self.backoff {
            Backoff::None => BackoffConfig {
                kind: BackoffKind::None,
                ..defaults
            },
            Backoff::Fixed { interval } => BackoffConfig {
                kind: BackoffKind::Fixed,
                initial_interval_ms: interval.as_millis() as u64,
                ..defaults
            },
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => BackoffConfig {
                kind: BackoffKind::Exponential,
                initial_interval_ms: initial.as_millis() as u64,
                multiplier: *multiplier,
                max_interval_ms: max.as_millis() as u64,
            },
        };

        RetryPolicyConfig {
            max_attempts: self.max_attempts,
            backoff,
            fatal_kinds: self.fatal_kinds.iter().cloned().collect(),
            jitter: self.jitter,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Never retry failures of this kind
    pub fn with_fatal_kind(mut self, kind: impl Into<String>) -> Self {
        self.fatal_kinds.insert(kind.into());
        self
    }

    pub fn with_fatal_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fatal_kinds.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Add up to 25% random jitter to each delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn fatal_kinds(&self) -> &BTreeSet<String> {
        &self.fatal_kinds
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Fatal if the failure says so or its kind is listed as fatal
    pub fn classify<E: FailureKind + ?Sized>(&self, failure: &E) -> FailureClass {
        if failure.is_fatal() || self.fatal_kinds.contains(failure.kind()) {
            FailureClass::Fatal
        } else {
            FailureClass::Retryable
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed)
    pub fn has_attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Whether `failure` on `attempt` should be retried
    ///
    /// Fatal failures are never retried, whatever attempts remain.
    pub fn should_retry<E: FailureKind + ?Sized>(&self, failure: &E, attempt: u32) -> bool {
        !self.classify(failure).is_fatal() && self.has_attempts_remaining(attempt)
    }

    /// Delay to wait after `attempt` fails
    pub fn next_delay(&self, attempt: u32) -> Duration {
        calculate_delay(&self.backoff, attempt, self.jitter)
    }

    /// Delays between consecutive attempts, without jitter
    ///
    /// Has `max_attempts - 1` entries: entry `i` is the wait after attempt `i + 1`.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|attempt| calculate_delay(&self.backoff, attempt, false))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ListenerError;

    #[test]
    fn test_zero_max_attempts_rejected() {
        let err = RetryPolicy::new(0).unwrap_err();
        assert!(matches!(err, RetryError::InvalidPolicy(_)));
    }

    #[test]
    fn test_should_retry_until_max_attempts() {
        let policy = RetryPolicy::new(3).unwrap();
        let err = ListenerError::transient("timeout", "slow");

        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
        assert!(!policy.should_retry(&err, 4));
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1).unwrap();
        let err = ListenerError::transient("timeout", "slow");
        assert!(!policy.should_retry(&err, 1));
        assert!(policy.schedule().is_empty());
    }

    #[test]
    fn test_fatal_kind_short_circuits() {
        let policy = RetryPolicy::new(10).unwrap().with_fatal_kind("quota");
        let err = ListenerError::transient("quota", "over quota");

        assert_eq!(policy.classify(&err), FailureClass::Fatal);
        assert!(!policy.should_retry(&err, 1));
    }

    #[test]
    fn test_inherently_fatal_failure_short_circuits() {
        let policy = RetryPolicy::new(10).unwrap();
        let err = ListenerError::deserialization("truncated");
        assert!(!policy.should_retry(&err, 1));
    }

    #[test]
    fn test_exponential_rejects_bad_parameters() {
        assert!(Backoff::exponential(Duration::from_millis(100), 0.5, Duration::from_secs(1)).is_err());
        assert!(Backoff::exponential(Duration::from_millis(100), f64::NAN, Duration::from_secs(1)).is_err());
        assert!(Backoff::exponential(Duration::from_secs(2), 2.0, Duration::from_secs(1)).is_err());
        assert!(Backoff::exponential(Duration::from_secs(1), 1.0, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = RetryPolicyConfig {
            max_attempts: 4,
            backoff: BackoffConfig {
                kind: BackoffKind::Exponential,
                initial_interval_ms: 100,
                multiplier: 3.0,
                max_interval_ms: 1000,
            },
            fatal_kinds: vec!["quota".to_string()],
            jitter: false,
        };

        let policy = RetryPolicy::from_config(&config).unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.fatal_kinds().contains("quota"));
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(300),
                Duration::from_millis(900),
            ]
        );
        assert_eq!(policy.to_config(), config);
    }

    #[test]
    fn test_from_config_rejects_zero_attempts() {
        let config = RetryPolicyConfig {
            max_attempts: 0,
            ..RetryPolicyConfig::default()
        };
        assert!(RetryPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_fixed_config_round_trip() {
        let policy = RetryPolicy::new(2)
            .unwrap()
            .with_backoff(Backoff::fixed(Duration::from_millis(250)));
        let config = policy.to_config();

        assert_eq!(config.backoff.kind, BackoffKind::Fixed);
        assert_eq!(config.backoff.initial_interval_ms, 250);
        assert_eq!(RetryPolicy::from_config(&config).unwrap(), policy);
    }

    #[test]
    fn test_next_delay_uses_backoff() {
        let policy = RetryPolicy::new(5).unwrap().with_backoff(Backoff::None);
        assert_eq!(policy.next_delay(1), Duration::ZERO);

        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(3), Duration::from_millis(4000));
    }
}
