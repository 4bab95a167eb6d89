//! Hierarchical listener configuration loader
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Config file (~/.redeliver/redeliver.yaml, or an explicit path)
//! 3. Environment variables (REDELIVER_* prefix)
//! 4. CLI flags (handled by caller)
//!
//! The file is merged key by key over the defaults, so a file that only sets
//! `retry.max-attempts` keeps every other default.

use std::env;
use std::fs;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;

use crate::error::{Error, Result};
use crate::types::ListenerConfig;
use crate::utils::get_home_dir;

/// Name of the user config file inside the config directory
pub const CONFIG_FILE_NAME: &str = "redeliver.yaml";

const DEFAULTS_FILE_NAME: &str = "redeliver-defaults.yaml";

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Listener configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory searched for `redeliver.yaml`
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.redeliver`
    pub fn new() -> Result<Self> {
        let home = get_home_dir()?;
        let home = Utf8PathBuf::from_path_buf(home).map_err(|path| {
            Error::invalid_config(format!(
                "Home directory is not valid UTF-8: {}",
                path.display()
            ))
        })?;

        Ok(Self {
            config_dir: home.join(".redeliver"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Path of the config file this loader looks for
    pub fn config_path(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Load configuration with hierarchical precedence
    ///
    /// A missing config file is not an error.
    pub fn load(&self) -> Result<ListenerConfig> {
        let path = self.config_path();
        let overlay = if path.exists() {
            Some(Self::load_yaml_value(&path)?)
        } else {
            None
        };
        Self::resolve(overlay)
    }

    /// Load configuration using an explicit file instead of the config directory
    ///
    /// Unlike [`ConfigLoader::load`], the file must exist.
    pub fn load_from(&self, path: &Utf8Path) -> Result<ListenerConfig> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }
        let overlay = Self::load_yaml_value(path)?;
        Self::resolve(Some(overlay))
    }

    /// Embedded defaults alone, without file or environment
    pub fn load_defaults() -> Result<ListenerConfig> {
        let value = Self::load_embedded_value(DEFAULTS_FILE_NAME)?;
        Self::deserialize(value, DEFAULTS_FILE_NAME)
    }

    fn resolve(overlay: Option<Value>) -> Result<ListenerConfig> {
        let mut value = Self::load_embedded_value(DEFAULTS_FILE_NAME)?;
        if let Some(overlay) = overlay {
            merge_values(&mut value, overlay);
        }

        let config = Self::deserialize(value, CONFIG_FILE_NAME)?;
        Self::apply_env_overrides(config)
    }

    fn deserialize(value: Value, source: &str) -> Result<ListenerConfig> {
        serde_yaml_ng::from_value(value)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", source, e)))
    }

    /// Load an embedded configuration file
    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file as an untyped value
    fn load_yaml_value(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(mut config: ListenerConfig) -> Result<ListenerConfig> {
        if let Some(val) = env_number("REDELIVER_MAX_ATTEMPTS")? {
            config.retry.max_attempts = val;
        }

        if let Ok(val) = env::var("REDELIVER_BACKOFF_KIND") {
            config.retry.backoff.kind = val.parse()?;
        }

        if let Some(val) = env_number("REDELIVER_INITIAL_INTERVAL_MS")? {
            config.retry.backoff.initial_interval_ms = val;
        }

        if let Some(val) = env_number("REDELIVER_MULTIPLIER")? {
            config.retry.backoff.multiplier = val;
        }

        if let Some(val) = env_number("REDELIVER_MAX_INTERVAL_MS")? {
            config.retry.backoff.max_interval_ms = val;
        }

        // Comma-separated; an empty value clears the list
        if let Ok(val) = env::var("REDELIVER_FATAL_KINDS") {
            config.retry.fatal_kinds = val
                .split(',')
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(val) = env_bool("REDELIVER_JITTER")? {
            config.retry.jitter = val;
        }

        if let Some(val) = env_number("REDELIVER_MAX_CONTENT_LOGGED")? {
            config.send_errors.max_content_logged = val;
        }

        if let Some(val) = env_bool("REDELIVER_INCLUDE_CONTENTS")? {
            config.send_errors.include_contents = val;
        }

        if let Ok(val) = env::var("REDELIVER_RECOVERY") {
            config.recovery = val.parse()?;
        }

        Ok(config)
    }
}

/// Recursively overlay `overlay` onto `base`
///
/// Mappings merge per key; any other value replaces the base. A null overlay
/// (an empty file or an empty key) leaves the base untouched.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn env_number<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match env::var(name) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(Error::invalid_config(format!(
                "{} must be true or false",
                name
            ))),
        },
        Err(_) => Ok(None),
    }
}
