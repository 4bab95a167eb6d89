//! Common test utilities for redeliver-core
//!
//! This module provides shared test infrastructure including:
//! - Message fixtures
//! - A scripted listener whose attempts fail or succeed on cue
//! - A mock consumer client and a recording send-error observer

#![allow(dead_code)]

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::Display;
use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};

use redeliver_core::client::ClientConfig;
use redeliver_core::producer::SendErrorObserver;
use redeliver_core::retry::{Backoff, ListenerError, RetryPolicy};
use redeliver_core::Message;

pub const ORDERS_TOPIC: &str = "orders";

/// A keyed message on the orders topic
pub fn order(partition: i32, offset: i64) -> Arc<Message> {
    Arc::new(
        Message::new(
            ORDERS_TOPIC,
            partition,
            offset,
            format!(r#"{{"order_id":{}}}"#, offset),
        )
        .with_key(format!("order-{}", offset)),
    )
}

/// Policy with delays short enough for tests
pub fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .unwrap()
        .with_backoff(Backoff::fixed(std::time::Duration::from_millis(1)))
}

/// Listener that replays a script of attempt results
///
/// Once the script runs out every further attempt succeeds. Every call is
/// recorded with the offset it saw.
#[derive(Clone, Default)]
pub struct ScriptedListener {
    script: Arc<Mutex<VecDeque<Result<(), ListenerError>>>>,
    calls: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `count` transient failures
    pub fn failing(self, count: usize) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for i in 0..count {
                script.push_back(Err(ListenerError::transient(
                    "timeout",
                    format!("scripted failure {}", i + 1),
                )));
            }
        }
        self
    }

    /// Queue one specific result
    pub fn then(self, result: Result<(), ListenerError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Process one attempt
    pub fn attempt(&self, message: Arc<Message>) -> Ready<Result<(), ListenerError>> {
        self.calls.lock().unwrap().push(message.offset());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        ready(next)
    }

    /// Processing function for `RetryExecutor::execute`
    pub fn process(&self) -> impl FnMut(Arc<Message>) -> Ready<Result<(), ListenerError>> + '_ {
        move |message| self.attempt(message)
    }

    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Consumer client built by the factory tests
#[derive(Debug, Clone, PartialEq)]
pub struct MockConsumer {
    pub client_id: Option<String>,
    pub config: ClientConfig,
}

impl MockConsumer {
    pub fn from_config(config: ClientConfig) -> redeliver_core::Result<Self> {
        Ok(Self {
            client_id: config.client_id(),
            config,
        })
    }
}

/// Send-error observer that keeps what it was given
#[derive(Default)]
pub struct RecordingSendErrorObserver {
    pub records: Mutex<Vec<RecordedSendError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSendError {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub error: String,
}

impl SendErrorObserver for RecordingSendErrorObserver {
    fn on_error(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: Option<&dyn Display>,
        value: Option<&dyn Display>,
        error: &dyn Error,
    ) {
        self.records.lock().unwrap().push(RecordedSendError {
            topic: topic.to_string(),
            partition,
            key: key.map(|k| k.to_string()),
            value: value.map(|v| v.to_string()),
            error: error.to_string(),
        });
    }
}
