//! Simulate command
//!
//! Pushes one synthetic message through a fully configured executor and
//! reports what a consumption loop would see.

use std::future::{self, Ready};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use redeliver_core::retry::{
    recoverer_for, Backoff, ListenerError, Outcome, RetryExecutorBuilder, RetryPolicy,
    StatsObserver, TracingObserver,
};
use redeliver_core::shutdown;
use redeliver_core::{Acknowledgment, Message, TrackingAcknowledgment};

use crate::cli::SimulateArgs;
use crate::output;

pub async fn run(args: SimulateArgs, config: Option<&Utf8Path>) -> Result<()> {
    let listener = super::load_config(config)?;

    let mut retry = listener.retry.clone();
    if let Some(max_attempts) = args.max_attempts {
        retry.max_attempts = max_attempts;
    }
    let mut policy = RetryPolicy::from_config(&retry).context("Invalid retry policy")?;
    if args.no_backoff {
        policy = policy.with_backoff(Backoff::None);
    }
    let recovery = args.recovery.unwrap_or(listener.recovery);

    let (handle, signal) = shutdown::new_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current attempt");
            handle.trigger();
        }
    });

    let stats = Arc::new(StatsObserver::new());
    let executor = RetryExecutorBuilder::<ListenerError>::new()
        .with_policy(policy)
        .with_observer((TracingObserver::new("simulate"), stats.clone()))
        .with_recovery_callback(recoverer_for(recovery))
        .with_shutdown(signal)
        .build();

    let tracking = Arc::new(TrackingAcknowledgment::new());
    let acknowledgment: Arc<dyn Acknowledgment> = tracking.clone();
    let message = Arc::new(Message::new(args.topic.clone(), 0, 0, args.payload.clone()));

    output::info(&format!(
        "Delivering {} (max {} attempts, recovery {})",
        message,
        executor.policy().max_attempts(),
        recovery
    ));

    let mut script = FailureScript::new(args.failures, args.fatal);
    let result = executor
        .execute(message, Some(acknowledgment), |_msg| script.next_attempt())
        .await;
    ctrl_c.abort();

    let outcome = result.context("Recovery callback failed")?;

    output::header("Outcome");
    match &outcome {
        Outcome::Succeeded { attempts } => {
            output::success(&format!("Delivered on attempt {}", attempts));
        }
        Outcome::Recovered { attempts, outcome } if outcome.is_handled() => {
            output::success(&format!("Recovered after {} attempt(s)", attempts));
        }
        Outcome::Recovered { attempts, outcome } => {
            output::warning(&format!(
                "Recovery ran after {} attempt(s) but left the message {}",
                attempts, outcome
            ));
        }
        Outcome::Exhausted(exhaustion) => {
            output::error(&format!(
                "Stopped after {} attempt(s) ({}): {}",
                exhaustion.attempts, exhaustion.reason, exhaustion.last_failure
            ));
        }
    }

    output::header("Summary");
    output::kv("Attempts", &outcome.attempts().to_string());
    output::kv("Retries", &stats.failures().to_string());
    output::kv("Acknowledged", &tracking.is_acknowledged().to_string());
    let path = stats
        .transitions()
        .iter()
        .map(|(from, to)| format!("{} -> {}", from, to))
        .collect::<Vec<_>>()
        .join(", ");
    output::kv("Transitions", &path);

    if let Outcome::Exhausted(exhaustion) = outcome {
        bail!(
            "delivery exhausted ({}); a consumer would redeliver this message",
            exhaustion.reason
        );
    }
    Ok(())
}

/// Fails the first `failures` attempts, then succeeds
struct FailureScript {
    failures: u32,
    fatal: bool,
    attempt: u32,
}

impl FailureScript {
    fn new(failures: u32, fatal: bool) -> Self {
        Self {
            failures,
            fatal,
            attempt: 0,
        }
    }

    fn next_attempt(&mut self) -> Ready<Result<(), ListenerError>> {
        self.attempt += 1;
        let result = if self.attempt > self.failures {
            Ok(())
        } else if self.fatal {
            Err(ListenerError::deserialization(format!(
                "attempt {} could not decode payload",
                self.attempt
            )))
        } else {
            Err(ListenerError::transient(
                "timeout",
                format!("attempt {} timed out", self.attempt),
            ))
        };
        future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redeliver_core::retry::FailureKind;

    #[test]
    fn test_script_fails_then_succeeds() {
        let mut script = FailureScript::new(2, false);

        let first = script.next_attempt().into_inner();
        let second = script.next_attempt().into_inner();
        let third = script.next_attempt().into_inner();

        assert!(first.is_err());
        assert!(!second.as_ref().unwrap_err().is_fatal());
        assert!(third.is_ok());
    }

    #[test]
    fn test_fatal_script_uses_deserialization() {
        let mut script = FailureScript::new(1, true);
        let failure = script.next_attempt().into_inner().unwrap_err();
        assert!(failure.is_fatal());
    }
}
