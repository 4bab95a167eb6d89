//! Consumer client properties
//!
//! Properties are kept as JSON values because broker clients accept the same
//! setting as a native type or as its string form (`true` vs `"true"`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Property holding the client id
pub const CLIENT_ID_CONFIG: &str = "client.id";

/// Property enabling broker-side automatic offset commits
pub const ENABLE_AUTO_COMMIT_CONFIG: &str = "enable.auto.commit";

/// Free-form client properties keyed by their broker names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientConfig {
    properties: BTreeMap<String, Value>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    /// Overlay `other` on top of this config; keys in `other` win
    pub fn merge(&mut self, other: ClientConfig) {
        self.properties.extend(other.properties);
    }

    /// The configured client id, rendered as a string
    ///
    /// Non-string values are rendered in their JSON form (`42` → `"42"`).
    pub fn client_id(&self) -> Option<String> {
        self.get(CLIENT_ID_CONFIG).map(render_value)
    }

    /// Config for a client whose id carries `suffix`
    ///
    /// Returns an unchanged copy when no client id is configured or no
    /// suffix is supplied; otherwise the copy's client id is the base id
    /// followed by the suffix.
    pub fn with_client_id_suffix(&self, suffix: Option<&str>) -> ClientConfig {
        match (self.client_id(), suffix) {
            (Some(base), Some(suffix)) => {
                let mut config = self.clone();
                config.insert(CLIENT_ID_CONFIG, format!("{}{}", base, suffix));
                config
            }
            _ => self.clone(),
        }
    }
}

impl FromIterator<(String, Value)> for ClientConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether `enable.auto.commit` is on
///
/// A boolean is taken as-is and a string is true only when it equals `"true"`
/// ignoring case. Any other type, and an absent property, yields `false`.
/// A present value of an unsupported type is logged rather than dropped
/// silently.
pub fn is_auto_commit_enabled(config: &ClientConfig) -> bool {
    match config.get(ENABLE_AUTO_COMMIT_CONFIG) {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(raw)) => raw.eq_ignore_ascii_case("true"),
        Some(other) => {
            tracing::warn!(
                property = ENABLE_AUTO_COMMIT_CONFIG,
                value = %other,
                "unsupported value type, treating auto-commit as disabled"
            );
            false
        }
        None => false,
    }
}
