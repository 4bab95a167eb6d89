//! Configuration type definitions

mod listener_config;

pub use listener_config::{
    BackoffConfig, BackoffKind, ListenerConfig, RecoveryMode, RetryPolicyConfig,
    SendErrorLogConfig,
};
