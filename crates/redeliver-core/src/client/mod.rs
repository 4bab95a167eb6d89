//! Consumer client construction
//!
//! Client lifecycle lives outside the retry engine; this module only derives
//! per-client configuration (client-id suffixing, auto-commit detection) and
//! hands it to a caller-supplied builder.

mod config;
mod factory;

pub use config::{is_auto_commit_enabled, ClientConfig, CLIENT_ID_CONFIG, ENABLE_AUTO_COMMIT_CONFIG};
pub use factory::{ClientFactory, ConsumerFactory};
