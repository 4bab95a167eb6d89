//! Recovery callbacks invoked once retries are exhausted
//!
//! A recovery callback runs at most once per delivery, after the final failed
//! attempt, and decides what becomes of the message: skip it, commit it, or
//! hand it somewhere else. An error returned from a callback is never retried.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::context::RetryContext;
use super::error::BoxError;
use super::failure::FailureKind;
use crate::types::RecoveryMode;

/// What a recovery callback did with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The message was dealt with and its position may advance
    Handled,
    /// The callback declined; the caller decides whether to hold the position
    Unhandled,
}

impl RecoveryOutcome {
    pub fn is_handled(self) -> bool {
        matches!(self, RecoveryOutcome::Handled)
    }
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryOutcome::Handled => write!(f, "handled"),
            RecoveryOutcome::Unhandled => write!(f, "unhandled"),
        }
    }
}

/// Terminal handler for a message whose retries are exhausted
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use redeliver_core::retry::{
///     BoxError, ListenerError, RecoveryCallback, RecoveryOutcome, RetryContext,
/// };
///
/// struct DeadLetter;
///
/// #[async_trait]
/// impl RecoveryCallback<ListenerError> for DeadLetter {
///     async fn recover(
///         &self,
///         ctx: &RetryContext<ListenerError>,
///     ) -> Result<RecoveryOutcome, BoxError> {
///         println!("dead-lettering {} after {} attempts", ctx.message(), ctx.attempt());
///         Ok(RecoveryOutcome::Handled)
///     }
/// }
/// ```
#[async_trait]
pub trait RecoveryCallback<E: FailureKind>: Send + Sync {
    /// Handle the message described by the final context
    async fn recover(&self, ctx: &RetryContext<E>) -> Result<RecoveryOutcome, BoxError>;
}

#[async_trait]
impl<E, T> RecoveryCallback<E> for Arc<T>
where
    E: FailureKind,
    T: RecoveryCallback<E> + ?Sized,
{
    async fn recover(&self, ctx: &RetryContext<E>) -> Result<RecoveryOutcome, BoxError> {
        (**self).recover(ctx).await
    }
}

/// Logs the abandoned message at ERROR and lets the position advance
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRecoverer;

#[async_trait]
impl<E: FailureKind> RecoveryCallback<E> for LoggingRecoverer {
    async fn recover(&self, ctx: &RetryContext<E>) -> Result<RecoveryOutcome, BoxError> {
        let message = ctx.message();
        let failure = ctx
            .last_failure()
            .map(ToString::to_string)
            .unwrap_or_default();

        error!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            attempts = ctx.attempt(),
            error = %failure,
            "Skipping message after {} attempts",
            ctx.attempt()
        );
        Ok(RecoveryOutcome::Handled)
    }
}

/// Commits the message's position through its acknowledgment handle
///
/// Reports [`RecoveryOutcome::Unhandled`] when the listener supplied no handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcknowledgingRecoverer;

#[async_trait]
impl<E: FailureKind> RecoveryCallback<E> for AcknowledgingRecoverer {
    async fn recover(&self, ctx: &RetryContext<E>) -> Result<RecoveryOutcome, BoxError> {
        let message = ctx.message();
        match ctx.acknowledgment() {
            Some(ack) => {
                ack.acknowledge();
                info!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    attempts = ctx.attempt(),
                    "Acknowledged message after retries were exhausted"
                );
                Ok(RecoveryOutcome::Handled)
            }
            None => {
                warn!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "No acknowledgment handle; leaving message unacknowledged"
                );
                Ok(RecoveryOutcome::Unhandled)
            }
        }
    }
}

/// Recovers with a synchronous closure
pub struct ClosureRecoverer<F> {
    recover: F,
}

impl<F> ClosureRecoverer<F> {
    pub fn new(recover: F) -> Self {
        Self { recover }
    }
}

#[async_trait]
impl<E, F> RecoveryCallback<E> for ClosureRecoverer<F>
where
    E: FailureKind,
    F: Fn(&RetryContext<E>) -> Result<RecoveryOutcome, BoxError> + Send + Sync,
{
    async fn recover(&self, ctx: &RetryContext<E>) -> Result<RecoveryOutcome, BoxError> {
        (self.recover)(ctx)
    }
}

/// Built-in recoverer for a configured recovery mode
///
/// `RecoveryMode::None` yields no callback, so exhausted deliveries surface
/// their last failure to the caller.
pub fn recoverer_for<E: FailureKind>(mode: RecoveryMode) -> Option<Arc<dyn RecoveryCallback<E>>> {
    match mode {
        RecoveryMode::None => None,
        RecoveryMode::Log => Some(Arc::new(LoggingRecoverer)),
        RecoveryMode::Acknowledge => Some(Arc::new(AcknowledgingRecoverer)),
    }
}
