//! Retry-governed delivery of broker messages
//!
//! This module wraps a single message-processing invocation with attempt
//! tracking, failure classification, backoff timing, and recovery or
//! propagation semantics. No message is silently dropped: a delivery ends as
//! succeeded, recovered by a callback, or exhausted with its last failure
//! handed back to the consumption loop.
//!
//! # Features
//!
//! - Bounded attempts with none, fixed, or capped exponential backoff
//! - Optional jitter on top of the capped delay
//! - Fatal failure kinds that are never retried
//! - Pluggable recovery callbacks (log, acknowledge, or your own)
//! - Observable attempts and state transitions via the `RetryObserver` trait
//! - Cooperative shutdown between attempts
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use redeliver_core::retry::{ListenerError, Outcome, RetryExecutorBuilder, RetryPolicy};
//! use redeliver_core::Message;
//!
//! async fn consume(message: Message) {
//!     let executor = RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::default())
//!         .build();
//!
//!     let outcome = executor
//!         .execute(Arc::new(message), None, |msg| async move {
//!             if msg.value().is_empty() {
//!                 return Err(ListenerError::deserialization("empty payload"));
//!             }
//!             Ok(())
//!         })
//!         .await;
//!
//!     if let Ok(Outcome::Exhausted(exhaustion)) = outcome {
//!         eprintln!("holding position: {}", exhaustion.last_failure);
//!     }
//! }
//! ```

mod context;
mod error;
mod executor;
mod failure;
mod observer;
mod policy;
mod recovery;
mod strategies;

pub use context::RetryContext;
pub use error::{BoxError, RetryError};
pub use executor::{
    deliver_with_policy, DeliveryState, ExhaustReason, Exhaustion, Outcome, RetryExecutor,
    RetryExecutorBuilder,
};
pub use failure::{FailureKind, ListenerError};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use policy::{Backoff, RetryPolicy};
pub use recovery::{
    recoverer_for, AcknowledgingRecoverer, ClosureRecoverer, LoggingRecoverer, RecoveryCallback,
    RecoveryOutcome,
};
pub use strategies::{
    calculate_delay, ClosureClassifier, DefaultClassifier, FailureClass, FailureClassifier,
    MessageClassifier, NeverRetry,
};

#[cfg(test)]
mod tests;
