//! Retry-governed delivery of a single message
//!
//! The executor wraps one processing function with attempt tracking, failure
//! classification, backoff timing, and the recovery or propagation decision.
//! It is the only component with branching logic; the policy, classifier,
//! observer and recovery callback are strategies it consults.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::message::{Acknowledgment, Message};
use crate::shutdown::ShutdownSignal;

use super::context::RetryContext;
use super::error::RetryError;
use super::failure::FailureKind;
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::RetryPolicy;
use super::recovery::{RecoveryCallback, RecoveryOutcome};
use super::strategies::{DefaultClassifier, FailureClassifier};

/// States of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    Attempting,
    Backoff,
    Recovering,
    Succeeded,
    Recovered,
    Exhausted,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryState::Succeeded | DeliveryState::Recovered | DeliveryState::Exhausted
        )
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryState::Attempting => "attempting",
            DeliveryState::Backoff => "backoff",
            DeliveryState::Recovering => "recovering",
            DeliveryState::Succeeded => "succeeded",
            DeliveryState::Recovered => "recovered",
            DeliveryState::Exhausted => "exhausted",
        };
        write!(f, "{}", name)
    }
}

/// Why the executor stopped retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExhaustReason {
    /// Every attempt the policy allows failed
    AttemptsExhausted,
    /// The failure was classified fatal
    Fatal,
    /// Shutdown was requested between attempts
    Shutdown,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::AttemptsExhausted => write!(f, "attempts exhausted"),
            ExhaustReason::Fatal => write!(f, "fatal failure"),
            ExhaustReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A delivery that ended without success or recovery
#[derive(Debug)]
pub struct Exhaustion<E> {
    /// Attempts made
    pub attempts: u32,
    pub reason: ExhaustReason,
    /// Failure of the final attempt
    pub last_failure: E,
}

/// Result of one `execute` call
#[derive(Debug)]
pub enum Outcome<E> {
    /// Processing succeeded on attempt `attempts`
    Succeeded { attempts: u32 },

    /// Retries stopped and the recovery callback ran
    Recovered {
        attempts: u32,
        outcome: RecoveryOutcome,
    },

    /// Retries stopped with no recovery; the caller decides whether to
    /// hold the message's position so it is redelivered
    Exhausted(Exhaustion<E>),
}

impl<E> Outcome<E> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Outcome::Recovered { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Outcome::Exhausted(_))
    }

    /// Whether the message may be treated as delivered
    ///
    /// True after success, or after recovery that handled the message.
    pub fn is_delivered(&self) -> bool {
        match self {
            Outcome::Succeeded { .. } => true,
            Outcome::Recovered { outcome, .. } => outcome.is_handled(),
            Outcome::Exhausted(_) => false,
        }
    }

    /// Attempts made, whatever the outcome
    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Succeeded { attempts } | Outcome::Recovered { attempts, .. } => *attempts,
            Outcome::Exhausted(exhaustion) => exhaustion.attempts,
        }
    }

    pub fn exhaustion(&self) -> Option<&Exhaustion<E>> {
        match self {
            Outcome::Exhausted(exhaustion) => Some(exhaustion),
            _ => None,
        }
    }

    pub fn into_exhaustion(self) -> Option<Exhaustion<E>> {
        match self {
            Outcome::Exhausted(exhaustion) => Some(exhaustion),
            _ => None,
        }
    }
}

/// Deliver a message with a policy and nothing else
///
/// No recovery callback, classifier or shutdown signal is involved, so the
/// call never fails with a `RetryError`; exhausted deliveries come back as
/// [`Outcome::Exhausted`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use redeliver_core::retry::{deliver_with_policy, Backoff, ListenerError, RetryPolicy};
/// use redeliver_core::Message;
///
/// # #[tokio::main]
/// # async fn main() {
/// let policy = RetryPolicy::new(3).unwrap().with_backoff(Backoff::None);
/// let message = Arc::new(Message::new("orders", 0, 7, "{}"));
///
/// let outcome = deliver_with_policy(&policy, message, None, |_msg| async {
///     Ok::<_, ListenerError>(())
/// })
/// .await
/// .unwrap();
///
/// assert!(outcome.is_succeeded());
/// # }
/// ```
pub async fn deliver_with_policy<E, F, Fut>(
    policy: &RetryPolicy,
    message: Arc<Message>,
    acknowledgment: Option<Arc<dyn Acknowledgment>>,
    process: F,
) -> Result<Outcome<E>, RetryError>
where
    E: FailureKind,
    F: FnMut(Arc<Message>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .build()
        .execute(message, acknowledgment, process)
        .await
}

/// Builder for configuring a `RetryExecutor`
///
/// # Example
///
/// ```rust
/// use redeliver_core::retry::{
///     ListenerError, LoggingRecoverer, RetryExecutorBuilder, RetryPolicy, TracingObserver,
/// };
///
/// let executor = RetryExecutorBuilder::<ListenerError>::new()
///     .with_policy(RetryPolicy::default())
///     .with_observer(TracingObserver::new("orders-listener"))
///     .with_recovery(LoggingRecoverer)
///     .build();
///
/// assert!(executor.has_recovery());
/// ```
pub struct RetryExecutorBuilder<E: FailureKind, C = DefaultClassifier, O = NoOpObserver> {
    policy: Arc<RetryPolicy>,
    classifier: C,
    observer: O,
    recovery: Option<Arc<dyn RecoveryCallback<E>>>,
    shutdown: Option<ShutdownSignal>,
}

impl<E: FailureKind> Default for RetryExecutorBuilder<E, DefaultClassifier, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FailureKind> RetryExecutorBuilder<E, DefaultClassifier, NoOpObserver> {
    /// Create a builder with the default policy and no recovery
    pub fn new() -> Self {
        Self {
            policy: Arc::new(RetryPolicy::default()),
            classifier: DefaultClassifier,
            observer: NoOpObserver,
            recovery: None,
            shutdown: None,
        }
    }
}

impl<E: FailureKind, C, O> RetryExecutorBuilder<E, C, O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Use a policy shared with other executors
    pub fn with_shared_policy(mut self, policy: Arc<RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set an additional classifier
    ///
    /// A failure is fatal if either the policy or the classifier says so.
    pub fn with_classifier<C2>(self, classifier: C2) -> RetryExecutorBuilder<E, C2, O> {
        RetryExecutorBuilder {
            policy: self.policy,
            classifier,
            observer: self.observer,
            recovery: self.recovery,
            shutdown: self.shutdown,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<E, C, O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            classifier: self.classifier,
            observer,
            recovery: self.recovery,
            shutdown: self.shutdown,
        }
    }

    /// Set the recovery callback invoked once retries stop
    pub fn with_recovery<R>(mut self, recovery: R) -> Self
    where
        R: RecoveryCallback<E> + 'static,
    {
        self.recovery = Some(Arc::new(recovery));
        self
    }

    /// Set or clear the recovery callback
    pub fn with_recovery_callback(mut self, recovery: Option<Arc<dyn RecoveryCallback<E>>>) -> Self {
        self.recovery = recovery;
        self
    }

    /// Observe a shutdown signal between attempts
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> RetryExecutor<E, C, O> {
        RetryExecutor {
            policy: self.policy,
            classifier: self.classifier,
            observer: self.observer,
            recovery: self.recovery,
            shutdown: self.shutdown,
        }
    }
}

/// Delivers messages under a retry policy
///
/// Use `RetryExecutorBuilder` to create an instance. One executor can serve
/// any number of sequential `execute` calls; each call owns its own
/// [`RetryContext`].
pub struct RetryExecutor<E: FailureKind, C = DefaultClassifier, O = NoOpObserver> {
    policy: Arc<RetryPolicy>,
    classifier: C,
    observer: O,
    recovery: Option<Arc<dyn RecoveryCallback<E>>>,
    shutdown: Option<ShutdownSignal>,
}

impl<E: FailureKind, C, O> RetryExecutor<E, C, O> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn has_recovery(&self) -> bool {
        self.recovery.is_some()
    }
}

impl<E, C, O> RetryExecutor<E, C, O>
where
    E: FailureKind,
    C: FailureClassifier<E>,
    O: RetryObserver,
{
    /// Deliver one message
    ///
    /// `process` is invoked once per attempt with the same message. The
    /// acknowledgment is only passed through to the recovery callback; the
    /// executor never commits it.
    ///
    /// # Returns
    ///
    /// The delivery outcome, or `RetryError::Recovery` if the recovery
    /// callback itself failed.
    pub async fn execute<F, Fut>(
        &self,
        message: Arc<Message>,
        acknowledgment: Option<Arc<dyn Acknowledgment>>,
        mut process: F,
    ) -> Result<Outcome<E>, RetryError>
    where
        F: FnMut(Arc<Message>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut ctx = RetryContext::new(message, acknowledgment);
        let mut shutdown = self.shutdown.clone();
        let max_attempts = self.policy.max_attempts();

        loop {
            let attempt = ctx.attempt();
            self.observer
                .on_attempt_start(ctx.message(), attempt, max_attempts);

            let failure = match process(Arc::clone(ctx.message())).await {
                Ok(()) => {
                    self.observer
                        .on_success(ctx.message(), attempt, ctx.elapsed());
                    self.transition(&ctx, DeliveryState::Attempting, DeliveryState::Succeeded);
                    return Ok(Outcome::Succeeded { attempts: attempt });
                }
                Err(failure) => failure,
            };

            let fatal = self.policy.classify(&failure).is_fatal()
                || self.classifier.classify(&failure).is_fatal();

            if fatal {
                return self
                    .stop(ctx, failure, ExhaustReason::Fatal, DeliveryState::Attempting)
                    .await;
            }
            if !self.policy.has_attempts_remaining(attempt) {
                return self
                    .stop(
                        ctx,
                        failure,
                        ExhaustReason::AttemptsExhausted,
                        DeliveryState::Attempting,
                    )
                    .await;
            }
            if is_triggered(&shutdown) {
                return self
                    .stop(ctx, failure, ExhaustReason::Shutdown, DeliveryState::Attempting)
                    .await;
            }

            let delay = self.policy.next_delay(attempt);
            self.observer
                .on_attempt_failed(ctx.message(), attempt, &failure, delay);
            self.transition(&ctx, DeliveryState::Attempting, DeliveryState::Backoff);

            if !wait_out_backoff(delay, &mut shutdown).await {
                return self
                    .stop(ctx, failure, ExhaustReason::Shutdown, DeliveryState::Backoff)
                    .await;
            }

            ctx.record_failure(failure);
            ctx.increment_attempt();
            self.transition(&ctx, DeliveryState::Backoff, DeliveryState::Attempting);
        }
    }

    /// End the retry loop: recover, or hand the failure back
    ///
    /// Shutdown never runs recovery.
    async fn stop(
        &self,
        mut ctx: RetryContext<E>,
        failure: E,
        reason: ExhaustReason,
        from: DeliveryState,
    ) -> Result<Outcome<E>, RetryError> {
        let attempts = ctx.attempt();
        self.observer
            .on_exhausted(ctx.message(), attempts, reason, &failure);

        match &self.recovery {
            Some(recovery) if reason != ExhaustReason::Shutdown => {
                ctx.record_failure(failure);
                self.transition(&ctx, from, DeliveryState::Recovering);

                let outcome = recovery
                    .recover(&ctx)
                    .await
                    .map_err(|source| RetryError::recovery(attempts, source))?;

                self.observer
                    .on_recovered(ctx.message(), attempts, outcome);
                self.transition(&ctx, DeliveryState::Recovering, DeliveryState::Recovered);
                Ok(Outcome::Recovered { attempts, outcome })
            }
            _ => {
                self.transition(&ctx, from, DeliveryState::Exhausted);
                Ok(Outcome::Exhausted(Exhaustion {
                    attempts,
                    reason,
                    last_failure: failure,
                }))
            }
        }
    }

    fn transition(&self, ctx: &RetryContext<E>, from: DeliveryState, to: DeliveryState) {
        self.observer.on_transition(ctx.message(), from, to);
    }
}

fn is_triggered(shutdown: &Option<ShutdownSignal>) -> bool {
    shutdown.as_ref().is_some_and(ShutdownSignal::is_triggered)
}

/// Sleep for `delay`; false if shutdown arrived during or right after it
async fn wait_out_backoff(delay: Duration, shutdown: &mut Option<ShutdownSignal>) -> bool {
    let Some(signal) = shutdown.as_mut() else {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        return true;
    };

    if !delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = signal.wait() => return false,
        }
    }

    !signal.is_triggered()
}
