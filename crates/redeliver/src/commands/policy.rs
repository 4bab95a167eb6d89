//! Policy inspection commands

use anyhow::{Context, Result};
use camino::Utf8Path;
use owo_colors::OwoColorize;
use redeliver_core::client::is_auto_commit_enabled;
use redeliver_core::retry::{Backoff, RetryPolicy};
use redeliver_core::types::{ListenerConfig, RecoveryMode, RetryPolicyConfig};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::{PolicyCommands, PolicyScheduleArgs, PolicyShowArgs};
use crate::output;

pub fn run(cmd: PolicyCommands, config: Option<&Utf8Path>) -> Result<()> {
    let listener = super::load_config(config)?;
    let policy = RetryPolicy::from_config(&listener.retry).context("Invalid retry policy")?;

    match cmd {
        PolicyCommands::Show(args) => show(&policy, &listener, args),
        PolicyCommands::Schedule(args) => schedule(&policy, args),
    }
}

// ============================================================================
// Show
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct PolicySummary {
    retry: RetryPolicyConfig,
    recovery: RecoveryMode,
    auto_commit: bool,
}

fn show(policy: &RetryPolicy, listener: &ListenerConfig, args: PolicyShowArgs) -> Result<()> {
    let auto_commit = is_auto_commit_enabled(&listener.consumer);

    if args.json {
        let summary = PolicySummary {
            retry: policy.to_config(),
            recovery: listener.recovery,
            auto_commit,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    output::header("Retry policy");
    output::kv("Max attempts", &policy.max_attempts().to_string());
    output::kv("Backoff", &describe_backoff(policy.backoff()));
    output::kv("Jitter", if policy.jitter() { "up to 25%" } else { "off" });
    let fatal = if policy.fatal_kinds().is_empty() {
        "none".dimmed().to_string()
    } else {
        policy
            .fatal_kinds()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    output::kv("Fatal kinds", &fatal);
    output::kv("Recovery", &listener.recovery.to_string());

    output::header("Send errors");
    output::kv(
        "Include contents",
        &listener.send_errors.include_contents.to_string(),
    );
    output::kv(
        "Max content logged",
        &listener.send_errors.max_content_logged.to_string(),
    );

    output::header("Consumer");
    match listener.consumer.client_id() {
        Some(id) => output::kv("Client id", &id),
        None => output::kv("Client id", &"unset".dimmed().to_string()),
    }
    output::kv("Auto commit", &auto_commit.to_string());
    if auto_commit {
        println!();
        output::warning("Auto commit is enabled; offsets may be committed before a retry succeeds");
    }

    Ok(())
}

fn describe_backoff(backoff: &Backoff) -> String {
    match backoff {
        Backoff::None => "none".to_string(),
        Backoff::Fixed { interval } => format!("fixed {}ms", interval.as_millis()),
        Backoff::Exponential {
            initial,
            multiplier,
            max,
        } => format!(
            "exponential {}ms x{} (max {}ms)",
            initial.as_millis(),
            multiplier,
            max.as_millis()
        ),
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Tabled, Serialize)]
struct ScheduleRow {
    #[tabled(rename = "After attempt")]
    after_attempt: u32,
    #[tabled(rename = "Delay (ms)")]
    delay_ms: u64,
    #[tabled(rename = "Elapsed (ms)")]
    elapsed_ms: u64,
}

fn schedule_rows(policy: &RetryPolicy) -> Vec<ScheduleRow> {
    let mut elapsed_ms = 0u64;
    policy
        .schedule()
        .into_iter()
        .zip(1u32..)
        .map(|(delay, after_attempt)| {
            let delay_ms = delay.as_millis() as u64;
            elapsed_ms = elapsed_ms.saturating_add(delay_ms);
            ScheduleRow {
                after_attempt,
                delay_ms,
                elapsed_ms,
            }
        })
        .collect()
}

fn schedule(policy: &RetryPolicy, args: PolicyScheduleArgs) -> Result<()> {
    let rows = schedule_rows(policy);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        output::info("The policy allows a single attempt; failures are never retried");
        return Ok(());
    }

    output::header(&format!("Retry schedule ({} attempts)", policy.max_attempts()));
    println!("{}", Table::new(&rows).with(Style::sharp()));

    if policy.jitter() {
        output::info("Jitter adds up to 25% on top of each delay shown");
    }

    Ok(())
}
