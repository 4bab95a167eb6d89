//! Integration tests for the retry module
//!
//! These tests exercise complete deliveries through the executor with the
//! policy, recoverers, observers and shutdown signal working together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::message::{Acknowledgment, Message, TrackingAcknowledgment};
use crate::retry::executor::{DeliveryState, ExhaustReason, Outcome, RetryExecutorBuilder};
use crate::retry::failure::ListenerError;
use crate::retry::observer::StatsObserver;
use crate::retry::policy::{Backoff, RetryPolicy};
use crate::retry::recovery::{
    recoverer_for, AcknowledgingRecoverer, ClosureRecoverer, RecoveryOutcome,
};
use crate::retry::{BoxError, RetryContext};
use crate::types::{RecoveryMode, RetryPolicyConfig};

/// Policy with delays short enough for tests
fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .unwrap()
        .with_backoff(Backoff::fixed(Duration::from_millis(1)))
}

fn order_message() -> Arc<Message> {
    Arc::new(Message::new("orders", 4, 1_042, r#"{"order_id":42}"#).with_key("order-42"))
}

/// Processing function that fails `failures` times, then succeeds
fn flaky(
    failures: u32,
    calls: Arc<AtomicU32>,
) -> impl FnMut(Arc<Message>) -> std::future::Ready<Result<(), ListenerError>> {
    move |_msg| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            std::future::ready(Err(ListenerError::transient(
                "timeout",
                format!("attempt {} timed out", call),
            )))
        } else {
            std::future::ready(Ok(()))
        }
    }
}

// ============================================================================
// Success after N-1 failures
// ============================================================================

#[tokio::test]
async fn test_succeeds_on_every_attempt_up_to_max() {
    for max_attempts in 1..=4 {
        for n in 1..=max_attempts {
            let calls = Arc::new(AtomicU32::new(0));
            let executor = RetryExecutorBuilder::new()
                .with_policy(quick_policy(max_attempts))
                .build();

            let outcome = executor
                .execute(order_message(), None, flaky(n - 1, calls.clone()))
                .await
                .unwrap();

            assert!(
                matches!(outcome, Outcome::Succeeded { attempts } if attempts == n),
                "max_attempts={} n={}",
                max_attempts,
                n
            );
            assert_eq!(calls.load(Ordering::SeqCst), n);
        }
    }
}

// ============================================================================
// Fatal failures
// ============================================================================

#[tokio::test]
async fn test_fatal_failure_called_once_regardless_of_max_attempts() {
    for max_attempts in [1, 3, 10] {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutorBuilder::new()
            .with_policy(quick_policy(max_attempts))
            .build();

        let outcome = executor
            .execute(order_message(), None, |_msg| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ListenerError::invalid_state("handler not initialised")) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.exhaustion().unwrap().reason, ExhaustReason::Fatal);
    }
}

#[tokio::test]
async fn test_configured_fatal_kind_goes_to_recovery() {
    let calls = Arc::new(AtomicU32::new(0));
    let recovered_at = Arc::new(AtomicU32::new(0));
    let recovered_at_clone = recovered_at.clone();

    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(5).with_fatal_kind("quota"))
        .with_recovery(ClosureRecoverer::new(
            move |ctx: &RetryContext<ListenerError>| {
                recovered_at_clone.store(ctx.attempt(), Ordering::SeqCst);
                Ok::<_, BoxError>(RecoveryOutcome::Handled)
            },
        ))
        .build();

    let outcome = executor
        .execute(order_message(), None, |_msg| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ListenerError::transient("quota", "tenant over quota")) }
        })
        .await
        .unwrap();

    assert!(outcome.is_recovered());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(recovered_at.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_same_message_and_ack_on_every_attempt() {
    let original = order_message();
    let ack: Arc<dyn Acknowledgment> = Arc::new(TrackingAcknowledgment::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let ack_clone = ack.clone();
    let original_clone = original.clone();
    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(3))
        .with_recovery(ClosureRecoverer::new(
            move |ctx: &RetryContext<ListenerError>| {
                assert!(Arc::ptr_eq(ctx.message(), &original_clone));
                assert!(Arc::ptr_eq(ctx.acknowledgment().unwrap(), &ack_clone));
                Ok::<_, BoxError>(RecoveryOutcome::Unhandled)
            },
        ))
        .build();

    let seen_clone = seen.clone();
    executor
        .execute(original.clone(), Some(ack), move |msg| {
            seen_clone.lock().unwrap().push(msg);
            async { Err(ListenerError::transient("timeout", "slow")) }
        })
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    for msg in seen.iter() {
        assert!(Arc::ptr_eq(msg, &original));
    }
}

// ============================================================================
// Exhaustion with and without recovery
// ============================================================================

#[tokio::test]
async fn test_exhaustion_with_recovery() {
    let calls = Arc::new(AtomicU32::new(0));
    let recoveries = Arc::new(Mutex::new(Vec::new()));
    let recoveries_clone = recoveries.clone();

    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(3))
        .with_recovery(ClosureRecoverer::new(
            move |ctx: &RetryContext<ListenerError>| {
                recoveries_clone.lock().unwrap().push(ctx.attempt());
                Ok::<_, BoxError>(RecoveryOutcome::Handled)
            },
        ))
        .build();

    let outcome = executor
        .execute(order_message(), None, flaky(u32::MAX, calls.clone()))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        Outcome::Recovered {
            attempts: 3,
            outcome: RecoveryOutcome::Handled
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(*recoveries.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn test_exhaustion_without_recovery_returns_last_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(3))
        .build();

    let outcome = executor
        .execute(order_message(), None, flaky(u32::MAX, calls.clone()))
        .await
        .unwrap();

    assert!(!outcome.is_delivered());
    let exhaustion = outcome.into_exhaustion().unwrap();
    assert_eq!(exhaustion.attempts, 3);
    assert_eq!(exhaustion.reason, ExhaustReason::AttemptsExhausted);
    // The failure handed back is the one from the final attempt
    assert_eq!(
        exhaustion.last_failure.to_string(),
        "transient failure (timeout): attempt 3 timed out"
    );
}

#[tokio::test]
async fn test_acknowledging_recovery_commits_through_context() {
    let tracker = Arc::new(TrackingAcknowledgment::new());
    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(2))
        .with_recovery(AcknowledgingRecoverer)
        .build();

    let outcome = executor
        .execute(order_message(), Some(tracker.clone()), |_msg| async {
            Err(ListenerError::transient("timeout", "slow"))
        })
        .await
        .unwrap();

    assert!(outcome.is_delivered());
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn test_recovery_from_config_mode() {
    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(2))
        .with_recovery_callback(recoverer_for::<ListenerError>(RecoveryMode::None))
        .build();
    assert!(!executor.has_recovery());

    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(2))
        .with_recovery_callback(recoverer_for::<ListenerError>(RecoveryMode::Log))
        .build();

    let outcome = executor
        .execute(order_message(), None, |_msg| async {
            Err(ListenerError::transient("timeout", "slow"))
        })
        .await
        .unwrap();
    assert!(outcome.is_recovered());
}

#[tokio::test]
async fn test_recovery_failure_is_not_retried() {
    let recoveries = Arc::new(AtomicU32::new(0));
    let recoveries_clone = recoveries.clone();

    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(3))
        .with_recovery(ClosureRecoverer::new(
            move |_: &RetryContext<ListenerError>| {
                recoveries_clone.fetch_add(1, Ordering::SeqCst);
                Err::<RecoveryOutcome, BoxError>("dead letter topic unavailable".into())
            },
        ))
        .build();

    let err = executor
        .execute(order_message(), None, |_msg| async {
            Err(ListenerError::transient("timeout", "slow"))
        })
        .await
        .unwrap_err();

    assert!(err.is_recovery());
    assert!(err.to_string().contains("dead letter topic unavailable"));
    assert_eq!(recoveries.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Observer and state machine
// ============================================================================

#[tokio::test]
async fn test_state_machine_for_recovered_delivery() {
    let observer = Arc::new(StatsObserver::new());
    let executor = RetryExecutorBuilder::new()
        .with_policy(quick_policy(2))
        .with_observer(observer.clone())
        .with_recovery(AcknowledgingRecoverer)
        .build();

    executor
        .execute(order_message(), None, |_msg| async {
            Err(ListenerError::transient("timeout", "slow"))
        })
        .await
        .unwrap();

    assert_eq!(
        observer.transitions(),
        vec![
            (DeliveryState::Attempting, DeliveryState::Backoff),
            (DeliveryState::Backoff, DeliveryState::Attempting),
            (DeliveryState::Attempting, DeliveryState::Recovering),
            (DeliveryState::Recovering, DeliveryState::Recovered),
        ]
    );
    assert_eq!(observer.attempt_starts(), 2);
    assert_eq!(observer.failures(), 1);
    assert_eq!(observer.exhaust_reasons(), vec![ExhaustReason::AttemptsExhausted]);
    assert_eq!(observer.recoveries(), 1);
}

// ============================================================================
// Policy from configuration
// ============================================================================

#[tokio::test]
async fn test_policy_from_default_config_drives_executor() {
    let mut config = RetryPolicyConfig::default();
    config.backoff.initial_interval_ms = 1;
    config.backoff.max_interval_ms = 4;
    config.fatal_kinds = vec!["schema-mismatch".to_string()];

    let policy = RetryPolicy::from_config(&config).unwrap();
    assert_eq!(policy.max_attempts(), 3);

    let calls = Arc::new(AtomicU32::new(0));
    let outcome = RetryExecutorBuilder::new()
        .with_policy(policy)
        .build()
        .execute(order_message(), None, flaky(2, calls.clone()))
        .await
        .unwrap();

    assert!(outcome.is_succeeded());
    assert_eq!(outcome.attempts(), 3);
}

#[test]
fn test_schedule_for_exponential_with_cap() {
    let policy = RetryPolicy::new(6).unwrap().with_backoff(
        Backoff::exponential(Duration::from_millis(100), 2.0, Duration::from_millis(500)).unwrap(),
    );

    let schedule: Vec<u128> = policy.schedule().iter().map(Duration::as_millis).collect();
    assert_eq!(schedule, vec![100, 200, 400, 500, 500]);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_before_sleep_skips_backoff_and_recovery() {
    let (handle, signal) = crate::shutdown::new_pair();
    let calls = Arc::new(AtomicU32::new(0));
    let observer = Arc::new(StatsObserver::new());

    let executor = RetryExecutorBuilder::new()
        .with_policy(
            RetryPolicy::new(3)
                .unwrap()
                .with_backoff(Backoff::fixed(Duration::from_secs(60))),
        )
        .with_observer(observer.clone())
        .with_recovery(AcknowledgingRecoverer)
        .with_shutdown(signal)
        .build();

    let outcome = executor
        .execute(order_message(), None, |_msg| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Shutdown arrives while the first attempt is running
            handle.trigger();
            async { Err(ListenerError::transient("timeout", "slow")) }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.exhaustion().unwrap().reason, ExhaustReason::Shutdown);
    assert_eq!(observer.recoveries(), 0);
    assert_eq!(
        observer.transitions(),
        vec![(DeliveryState::Attempting, DeliveryState::Exhausted)]
    );
}

#[tokio::test]
async fn test_dropped_shutdown_handle_is_not_shutdown() {
    let (handle, signal) = crate::shutdown::new_pair();
    drop(handle);

    let calls = Arc::new(AtomicU32::new(0));
    let outcome = RetryExecutorBuilder::new()
        .with_policy(quick_policy(3))
        .with_shutdown(signal)
        .build()
        .execute(order_message(), None, flaky(2, calls.clone()))
        .await
        .unwrap();

    assert!(outcome.is_succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
