//! Command implementations

pub mod policy;
pub mod simulate;

use anyhow::{Context, Result};
use camino::Utf8Path;
use redeliver_core::types::ListenerConfig;
use redeliver_core::ConfigLoader;

/// Resolve the listener configuration
///
/// An explicit `--config` file must exist; otherwise `~/.redeliver/redeliver.yaml`
/// is used when present. Defaults and environment overrides apply either way.
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<ListenerConfig> {
    let loader = ConfigLoader::new().context("Failed to locate config directory")?;
    match path {
        Some(path) => loader
            .load_from(path)
            .with_context(|| format!("Failed to load config from {}", path)),
        None => loader.load().context("Failed to load config"),
    }
}
