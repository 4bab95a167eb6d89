//! Per-invocation retry state

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::message::{Acknowledgment, Message};

/// State of one `execute` call
///
/// Created with attempt 1 when the call starts and dropped when it returns.
/// The message and acknowledgment never change; only the attempt counter and
/// the last failure move.
pub struct RetryContext<E> {
    message: Arc<Message>,
    acknowledgment: Option<Arc<dyn Acknowledgment>>,
    attempt: u32,
    last_failure: Option<E>,
    started: Instant,
}

impl<E> RetryContext<E> {
    pub(crate) fn new(message: Arc<Message>, acknowledgment: Option<Arc<dyn Acknowledgment>>) -> Self {
        Self {
            message,
            acknowledgment,
            attempt: 1,
            last_failure: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn increment_attempt(&mut self) {
        self.attempt += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: E) {
        self.last_failure = Some(failure);
    }

    /// The message being delivered
    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    /// Handle for committing the message's position, if the listener has one
    pub fn acknowledgment(&self) -> Option<&Arc<dyn Acknowledgment>> {
        self.acknowledgment.as_ref()
    }

    /// Current attempt (1-indexed)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Failure of the most recent failed attempt
    pub fn last_failure(&self) -> Option<&E> {
        self.last_failure.as_ref()
    }

    /// Time since the first attempt started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl<E: fmt::Debug> fmt::Debug for RetryContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryContext")
            .field("message", &self.message.to_string())
            .field("acknowledgment", &self.acknowledgment.is_some())
            .field("attempt", &self.attempt)
            .field("last_failure", &self.last_failure)
            .finish()
    }
}
