//! Delivery observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring delivery
//! attempts and a `TracingObserver` implementation that logs using the
//! `tracing` crate.

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::executor::{DeliveryState, ExhaustReason};
use super::recovery::RecoveryOutcome;
use crate::message::Message;

/// Observer trait for delivery events
///
/// Implement this trait to receive callbacks while an executor works through
/// one message. Useful for logging, metrics collection, or debugging.
///
/// # Example
///
/// ```rust
/// use redeliver_core::retry::{ExhaustReason, RetryObserver};
/// use redeliver_core::Message;
/// use std::error::Error;
/// use std::time::Duration;
///
/// struct MetricsObserver;
///
/// impl RetryObserver for MetricsObserver {
///     fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32) {}
///
///     fn on_attempt_failed(
///         &self,
///         message: &Message,
///         attempt: u32,
///         error: &dyn Error,
///         delay: Duration,
///     ) {
///     }
///
///     fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration) {}
///
///     fn on_exhausted(
///         &self,
///         message: &Message,
///         attempts: u32,
///         reason: ExhaustReason,
///         final_error: &dyn Error,
///     ) {
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start
    ///
    /// # Arguments
    ///
    /// * `message` - The message being delivered
    /// * `attempt` - The attempt number (1-indexed)
    /// * `max_attempts` - The policy's attempt limit
    fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32);

    /// Called when an attempt fails and will be retried after `delay`
    fn on_attempt_failed(&self, message: &Message, attempt: u32, error: &dyn Error, delay: Duration);

    /// Called when processing succeeds
    ///
    /// # Arguments
    ///
    /// * `message` - The message being delivered
    /// * `attempt` - The attempt that succeeded (1-indexed)
    /// * `total_duration` - Time spent across all attempts
    fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration);

    /// Called when the executor stops retrying
    ///
    /// Fires before any recovery callback runs, for every reason the
    /// retry loop can end without success.
    fn on_exhausted(
        &self,
        message: &Message,
        attempts: u32,
        reason: ExhaustReason,
        final_error: &dyn Error,
    );

    /// Called after a recovery callback returns
    fn on_recovered(&self, message: &Message, attempts: u32, outcome: RecoveryOutcome) {
        let _ = (message, attempts, outcome);
    }

    /// Called on every state machine transition
    fn on_transition(&self, message: &Message, from: DeliveryState, to: DeliveryState) {
        let _ = (message, from, to);
    }
}

/// An observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _message: &Message, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(
        &self,
        _message: &Message,
        _attempt: u32,
        _error: &dyn Error,
        _delay: Duration,
    ) {
    }

    fn on_success(&self, _message: &Message, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(
        &self,
        _message: &Message,
        _attempts: u32,
        _reason: ExhaustReason,
        _final_error: &dyn Error,
    ) {
    }
}

/// An observer that logs delivery events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR, or WARN for fatal failures and shutdown
/// - `on_recovered`: INFO
/// - `on_transition`: TRACE
///
/// # Example
///
/// ```rust
/// use redeliver_core::retry::TracingObserver;
///
/// let observer = TracingObserver::new("orders-listener");
/// assert_eq!(observer.listener(), "orders-listener");
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the listener whose deliveries are observed
    listener: String,
}

impl TracingObserver {
    pub fn new(listener: impl Into<String>) -> Self {
        Self {
            listener: listener.into(),
        }
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("listener")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            listener = %self.listener,
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            attempt = attempt,
            max_attempts = max_attempts,
            "starting delivery attempt"
        );
    }

    fn on_attempt_failed(&self, message: &Message, attempt: u32, error: &dyn Error, delay: Duration) {
        tracing::warn!(
            listener = %self.listener,
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "delivery attempt failed, will retry"
        );
    }

    fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                listener = %self.listener,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "delivered after retry"
            );
        } else {
            tracing::debug!(
                listener = %self.listener,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                duration_ms = total_duration.as_millis() as u64,
                "delivered on first attempt"
            );
        }
    }

    fn on_exhausted(
        &self,
        message: &Message,
        attempts: u32,
        reason: ExhaustReason,
        final_error: &dyn Error,
    ) {
        match reason {
            ExhaustReason::AttemptsExhausted => tracing::error!(
                listener = %self.listener,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                attempts = attempts,
                error = %final_error,
                "all delivery attempts exhausted"
            ),
            ExhaustReason::Fatal => tracing::warn!(
                listener = %self.listener,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                attempts = attempts,
                error = %final_error,
                "delivery stopped on non-retryable failure"
            ),
            ExhaustReason::Shutdown => tracing::warn!(
                listener = %self.listener,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                attempts = attempts,
                error = %final_error,
                "delivery abandoned for shutdown"
            ),
        }
    }

    fn on_recovered(&self, message: &Message, attempts: u32, outcome: RecoveryOutcome) {
        tracing::info!(
            listener = %self.listener,
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            attempts = attempts,
            outcome = %outcome,
            "recovery callback completed"
        );
    }

    fn on_transition(&self, message: &Message, from: DeliveryState, to: DeliveryState) {
        tracing::trace!(
            listener = %self.listener,
            offset = message.offset(),
            from = %from,
            to = %to,
            "delivery state changed"
        );
    }
}

/// An observer that collects statistics about deliveries
///
/// Useful for testing and for the simulator's summary output.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    recoveries: AtomicU32,
    transitions: Mutex<Vec<(DeliveryState, DeliveryState)>>,
    exhaust_reasons: Mutex<Vec<ExhaustReason>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Failures that were followed by a retry
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::SeqCst)
    }

    /// Every transition seen, in order
    pub fn transitions(&self) -> Vec<(DeliveryState, DeliveryState)> {
        self.transitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reasons passed to `on_exhausted`, in order
    pub fn exhaust_reasons(&self) -> Vec<ExhaustReason> {
        self.exhaust_reasons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _message: &Message, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(
        &self,
        _message: &Message,
        _attempt: u32,
        _error: &dyn Error,
        _delay: Duration,
    ) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _message: &Message, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(
        &self,
        _message: &Message,
        _attempts: u32,
        reason: ExhaustReason,
        _final_error: &dyn Error,
    ) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
        self.exhaust_reasons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(reason);
    }

    fn on_recovered(&self, _message: &Message, _attempts: u32, _outcome: RecoveryOutcome) {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_transition(&self, _message: &Message, from: DeliveryState, to: DeliveryState) {
        self.transitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((from, to));
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(message, attempt, max_attempts)
    }

    fn on_attempt_failed(&self, message: &Message, attempt: u32, error: &dyn Error, delay: Duration) {
        (**self).on_attempt_failed(message, attempt, error, delay)
    }

    fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration) {
        (**self).on_success(message, attempt, total_duration)
    }

    fn on_exhausted(
        &self,
        message: &Message,
        attempts: u32,
        reason: ExhaustReason,
        final_error: &dyn Error,
    ) {
        (**self).on_exhausted(message, attempts, reason, final_error)
    }

    fn on_recovered(&self, message: &Message, attempts: u32, outcome: RecoveryOutcome) {
        (**self).on_recovered(message, attempts, outcome)
    }

    fn on_transition(&self, message: &Message, from: DeliveryState, to: DeliveryState) {
        (**self).on_transition(message, from, to)
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(message, attempt, max_attempts)
    }

    fn on_attempt_failed(&self, message: &Message, attempt: u32, error: &dyn Error, delay: Duration) {
        (**self).on_attempt_failed(message, attempt, error, delay)
    }

    fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration) {
        (**self).on_success(message, attempt, total_duration)
    }

    fn on_exhausted(
        &self,
        message: &Message,
        attempts: u32,
        reason: ExhaustReason,
        final_error: &dyn Error,
    ) {
        (**self).on_exhausted(message, attempts, reason, final_error)
    }

    fn on_recovered(&self, message: &Message, attempts: u32, outcome: RecoveryOutcome) {
        (**self).on_recovered(message, attempts, outcome)
    }

    fn on_transition(&self, message: &Message, from: DeliveryState, to: DeliveryState) {
        (**self).on_transition(message, from, to)
    }
}

/// Both observers receive every event, first `A` then `B`
impl<A: RetryObserver, B: RetryObserver> RetryObserver for (A, B) {
    fn on_attempt_start(&self, message: &Message, attempt: u32, max_attempts: u32) {
        self.0.on_attempt_start(message, attempt, max_attempts);
        self.1.on_attempt_start(message, attempt, max_attempts);
    }

    fn on_attempt_failed(&self, message: &Message, attempt: u32, error: &dyn Error, delay: Duration) {
        self.0.on_attempt_failed(message, attempt, error, delay);
        self.1.on_attempt_failed(message, attempt, error, delay);
    }

    fn on_success(&self, message: &Message, attempt: u32, total_duration: Duration) {
        self.0.on_success(message, attempt, total_duration);
        self.1.on_success(message, attempt, total_duration);
    }

    fn on_exhausted(
        &self,
        message: &Message,
        attempts: u32,
        reason: ExhaustReason,
        final_error: &dyn Error,
    ) {
        self.0.on_exhausted(message, attempts, reason, final_error);
        self.1.on_exhausted(message, attempts, reason, final_error);
    }

    fn on_recovered(&self, message: &Message, attempts: u32, outcome: RecoveryOutcome) {
        self.0.on_recovered(message, attempts, outcome);
        self.1.on_recovered(message, attempts, outcome);
    }

    fn on_transition(&self, message: &Message, from: DeliveryState, to: DeliveryState) {
        self.0.on_transition(message, from, to);
        self.1.on_transition(message, from, to);
    }
}
