//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use redeliver_core::types::RecoveryMode;

/// redeliver - retry-governed message delivery
#[derive(Parser, Debug)]
#[command(name = "redeliver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a redeliver.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the resolved retry policy
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Run one synthetic message through the executor
    Simulate(SimulateArgs),
}

// Policy commands
#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Print the resolved policy
    Show(PolicyShowArgs),

    /// Print the delay before each retry
    Schedule(PolicyScheduleArgs),
}

#[derive(Args, Debug)]
pub struct PolicyShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PolicyScheduleArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of attempts that fail before processing succeeds
    #[arg(short, long, default_value_t = 0)]
    pub failures: u32,

    /// Fail with a deserialization error, which is never retried
    #[arg(long)]
    pub fatal: bool,

    /// Recovery once retries stop (none, log, acknowledge)
    #[arg(short, long)]
    pub recovery: Option<RecoveryMode>,

    /// Override the configured attempt limit
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Retry immediately instead of waiting out the configured backoff
    #[arg(long)]
    pub no_backoff: bool,

    /// Topic of the synthetic message
    #[arg(long, default_value = "simulated")]
    pub topic: String,

    /// Payload of the synthetic message
    #[arg(long, default_value = "{}")]
    pub payload: String,
}
