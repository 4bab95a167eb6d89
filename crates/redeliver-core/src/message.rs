//! Inbound message model and the acknowledgment capability
//!
//! A [`Message`] is immutable once built and is shared as `Arc<Message>` so
//! every retry attempt and the recovery callback observe the same instance.
//! An [`Acknowledgment`] is owned by the consumption loop; the retry engine
//! only passes it through.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// One unit of work received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<Vec<u8>>,
    value: Vec<u8>,
}

impl Message {
    /// Create a message without a key
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value: value.into(),
        }
    }

    /// Attach a key
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Key rendered as UTF-8, replacing invalid sequences
    pub fn key_lossy(&self) -> Option<Cow<'_, str>> {
        self.key.as_deref().map(String::from_utf8_lossy)
    }

    /// Value rendered as UTF-8, replacing invalid sequences
    pub fn value_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Renders as `topic-partition@offset`
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}@{}", self.topic, self.partition, self.offset)
    }
}

/// Capability to commit the consumed position of a message
///
/// Implemented by the consumption loop. The retry executor never calls
/// [`Acknowledgment::acknowledge`] itself; recovery callbacks may.
pub trait Acknowledgment: Send + Sync + fmt::Debug {
    /// Commit the position of the message this handle belongs to
    fn acknowledge(&self);
}

/// An in-memory acknowledgment that counts commits
///
/// Used by the simulator and by tests to observe whether (and how often)
/// a message was acknowledged.
#[derive(Debug, Default)]
pub struct TrackingAcknowledgment {
    acknowledgments: AtomicU32,
}

impl TrackingAcknowledgment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `acknowledge` was called
    pub fn count(&self) -> u32 {
        self.acknowledgments.load(Ordering::SeqCst)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.count() > 0
    }
}

impl Acknowledgment for TrackingAcknowledgment {
    fn acknowledge(&self) {
        self.acknowledgments.fetch_add(1, Ordering::SeqCst);
    }
}
