//! Backoff delay calculation and failure classifiers
//!
//! This module turns a [`Backoff`] into concrete delays and provides the
//! [`FailureClassifier`] trait an executor can use to refine which failures
//! are retried beyond what the policy already decides.

use rand::Rng;
use std::time::Duration;

use super::policy::Backoff;

/// Calculate the delay before the attempt that follows `attempt`
///
/// # Arguments
///
/// * `backoff` - The backoff strategy
/// * `attempt` - The attempt that just failed (1-indexed)
/// * `jitter` - Whether to add up to 25% random delay on top
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use redeliver_core::retry::{calculate_delay, Backoff};
///
/// let backoff = Backoff::exponential(
///     Duration::from_millis(1000),
///     2.0,
///     Duration::from_millis(30000),
/// )
/// .unwrap();
///
/// assert_eq!(calculate_delay(&backoff, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&backoff, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(backoff: &Backoff, attempt: u32, jitter: bool) -> Duration {
    // Attempt is 1-indexed; the exponent is 0-indexed
    let attempt_index = attempt.saturating_sub(1);

    let delay_ms = match backoff {
        Backoff::None => 0,

        Backoff::Fixed { interval } => duration_ms(*interval),

        Backoff::Exponential {
            initial,
            multiplier,
            max,
        } => {
            let factor = multiplier.powf(attempt_index as f64);
            // Float-to-int casts saturate, so an overflowing product lands on the cap
            let grown = (duration_ms(*initial) as f64 * factor) as u64;
            grown.min(duration_ms(*max))
        }
    };

    let final_delay_ms = if jitter && delay_ms > 0 {
        let jitter_range = delay_ms / 4;
        delay_ms.saturating_add(rand::rng().random_range(0..=jitter_range))
    } else {
        delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// How a failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// May succeed on a later attempt
    Retryable,
    /// Never retried, regardless of remaining attempts
    Fatal,
}

impl FailureClass {
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureClass::Fatal)
    }
}

/// Decides whether a failure should be retried
///
/// The executor treats a failure as fatal if either its policy or its
/// classifier says so. Use a classifier for rules that depend on more than
/// the failure's kind string.
///
/// # Example
///
/// ```rust
/// use redeliver_core::retry::{FailureClass, FailureClassifier, ListenerError};
///
/// struct RejectPoisonPills;
///
/// impl FailureClassifier<ListenerError> for RejectPoisonPills {
///     fn classify(&self, failure: &ListenerError) -> FailureClass {
///         if failure.to_string().contains("poison") {
///             FailureClass::Fatal
///         } else {
///             FailureClass::Retryable
///         }
///     }
/// }
/// ```
pub trait FailureClassifier<E: ?Sized>: Send + Sync {
    fn classify(&self, failure: &E) -> FailureClass;
}

/// Leaves classification entirely to the policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E: ?Sized> FailureClassifier<E> for DefaultClassifier {
    fn classify(&self, _failure: &E) -> FailureClass {
        FailureClass::Retryable
    }
}

/// Treats every failure as fatal (at most one attempt)
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> FailureClassifier<E> for NeverRetry {
    fn classify(&self, _failure: &E) -> FailureClass {
        FailureClass::Fatal
    }
}

/// Classifies with a closure returning `true` for retryable failures
pub struct ClosureClassifier<F> {
    retryable: F,
}

impl<F> ClosureClassifier<F> {
    pub fn new(retryable: F) -> Self {
        Self { retryable }
    }
}

impl<E, F> FailureClassifier<E> for ClosureClassifier<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn classify(&self, failure: &E) -> FailureClass {
        if (self.retryable)(failure) {
            FailureClass::Retryable
        } else {
            FailureClass::Fatal
        }
    }
}

/// Retries only failures whose message contains one of the given patterns
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    retryable_patterns: Vec<String>,
}

impl MessageClassifier {
    /// Patterns are matched case-insensitively
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Patterns for common transient downstream failures
    pub fn transient_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "temporarily unavailable".to_string(),
            "try again".to_string(),
        ])
    }
}

impl<E: std::error::Error + ?Sized> FailureClassifier<E> for MessageClassifier {
    fn classify(&self, failure: &E) -> FailureClass {
        let message = failure.to_string().to_lowercase();
        if self
            .retryable_patterns
            .iter()
            .any(|pattern| message.contains(pattern))
        {
            FailureClass::Retryable
        } else {
            FailureClass::Fatal
        }
    }
}
