//! Observation of producer send failures

use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::types::SendErrorLogConfig;

/// Default cap on characters logged for a key or payload
pub const DEFAULT_MAX_CONTENT_LOGGED: usize = 100;

/// Callback for records the producer failed to send
pub trait SendErrorObserver: Send + Sync {
    /// Called once per failed send
    ///
    /// `key` and `value` are `None` when the record had none.
    fn on_error(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: Option<&dyn Display>,
        value: Option<&dyn Display>,
        error: &dyn Error,
    );
}

impl<T: SendErrorObserver + ?Sized> SendErrorObserver for Arc<T> {
    fn on_error(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: Option<&dyn Display>,
        value: Option<&dyn Display>,
        error: &dyn Error,
    ) {
        (**self).on_error(topic, partition, key, value, error)
    }
}

/// Logs each failed send at ERROR level
///
/// Key and payload are truncated to `max_content_logged` characters, with a
/// trailing `...` when cut, and can be left out entirely.
#[derive(Debug, Clone)]
pub struct LoggingSendErrorObserver {
    include_contents: bool,
    max_content_logged: usize,
}

impl Default for LoggingSendErrorObserver {
    fn default() -> Self {
        Self {
            include_contents: true,
            max_content_logged: DEFAULT_MAX_CONTENT_LOGGED,
        }
    }
}

impl LoggingSendErrorObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SendErrorLogConfig) -> Self {
        Self {
            include_contents: config.include_contents,
            max_content_logged: config.max_content_logged,
        }
    }

    /// Whether the key and payload appear in the log line
    pub fn with_include_contents(mut self, include_contents: bool) -> Self {
        self.include_contents = include_contents;
        self
    }

    /// Maximum characters logged for either key or payload
    pub fn with_max_content_logged(mut self, max_content_logged: usize) -> Self {
        self.max_content_logged = max_content_logged;
        self
    }

    pub fn include_contents(&self) -> bool {
        self.include_contents
    }

    pub fn max_content_logged(&self) -> usize {
        self.max_content_logged
    }

    /// Build the log line for a failed send
    pub fn render(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: Option<&dyn Display>,
        value: Option<&dyn Display>,
    ) -> String {
        let mut line = String::from("Exception thrown when sending a message");
        if self.include_contents {
            line.push_str(&format!(
                " with key='{}' and payload='{}'",
                truncate_for_display(&null_safe(key), self.max_content_logged),
                truncate_for_display(&null_safe(value), self.max_content_logged),
            ));
        }
        line.push_str(&format!(" to topic {}", topic));
        if let Some(partition) = partition {
            line.push_str(&format!(" and partition {}", partition));
        }
        line.push(':');
        line
    }
}

impl SendErrorObserver for LoggingSendErrorObserver {
    fn on_error(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: Option<&dyn Display>,
        value: Option<&dyn Display>,
        error: &dyn Error,
    ) {
        if !tracing::enabled!(tracing::Level::ERROR) {
            return;
        }

        let line = self.render(topic, partition, key, value);
        tracing::error!(
            topic = %topic,
            partition = ?partition,
            error = %error,
            "{}",
            line
        );
    }
}

fn null_safe(content: Option<&dyn Display>) -> String {
    content.map_or_else(|| "null".to_string(), |c| c.to_string())
}

/// Cut `original` to `max_chars` characters, appending `...` when cut
pub fn truncate_for_display(original: &str, max_chars: usize) -> Cow<'_, str> {
    match original.char_indices().nth(max_chars) {
        None => Cow::Borrowed(original),
        Some((cut, _)) => Cow::Owned(format!("{}...", &original[..cut])),
    }
}

/// Wraps a byte payload so it can be passed where a [`Display`] is expected
pub struct Utf8Lossy<'a>(pub &'a [u8]);

impl Display for Utf8Lossy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.0))
    }
}
