//! # redeliver-core
//!
//! Core library for redeliver providing:
//! - Retry-governed delivery of a single broker message (`retry`)
//! - Recovery callbacks invoked once retries are exhausted
//! - Consumer client factories with client-id suffixing (`client`)
//! - A logging observer for producer send failures (`producer`)
//! - Hierarchical listener configuration (embedded defaults, file, environment)

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod producer;
pub mod retry;
pub mod shutdown;
pub mod types;
pub mod utils;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use message::{Acknowledgment, Message, TrackingAcknowledgment};
pub use utils::get_home_dir;
