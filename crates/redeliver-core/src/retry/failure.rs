//! Failure kinds reported by processing functions

use thiserror::Error;

/// A processing failure the retry engine can classify
///
/// `kind` names the failure for matching against a policy's fatal kinds.
/// Failures that can never succeed on retry (bad payloads, programmer
/// errors) report themselves fatal.
pub trait FailureKind: std::error::Error + Send + Sync + 'static {
    /// Short, stable name of this failure kind
    fn kind(&self) -> &str;

    /// Whether this failure is never worth retrying, whatever the policy says
    fn is_fatal(&self) -> bool {
        false
    }
}

/// Stock failure type for listeners
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A transient failure, e.g. a downstream timeout
    #[error("transient failure ({kind}): {message}")]
    Transient { kind: String, message: String },

    /// The payload could not be deserialized
    #[error("failed to deserialize payload: {0}")]
    Deserialization(String),

    /// The listener reached a state it should never be in
    #[error("invalid listener state: {0}")]
    InvalidState(String),

    /// The listener refuses to process this message
    #[error("message rejected ({kind}): {message}")]
    Rejected { kind: String, message: String },
}

impl ListenerError {
    pub fn transient(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ListenerError::Transient {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        ListenerError::Deserialization(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ListenerError::InvalidState(message.into())
    }

    pub fn rejected(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ListenerError::Rejected {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl FailureKind for ListenerError {
    fn kind(&self) -> &str {
        match self {
            ListenerError::Transient { kind, .. } => kind,
            ListenerError::Deserialization(_) => "deserialization",
            ListenerError::InvalidState(_) => "invalid-state",
            ListenerError::Rejected { kind, .. } => kind,
        }
    }

    fn is_fatal(&self) -> bool {
        !matches!(self, ListenerError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        let err = ListenerError::transient("timeout", "inventory service timed out");
        assert_eq!(err.kind(), "timeout");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_inherently_fatal_kinds() {
        let deser = ListenerError::deserialization("unexpected end of input");
        assert_eq!(deser.kind(), "deserialization");
        assert!(deser.is_fatal());

        let state = ListenerError::invalid_state("handler not initialised");
        assert_eq!(state.kind(), "invalid-state");
        assert!(state.is_fatal());

        let rejected = ListenerError::rejected("schema-mismatch", "v3 payload on v2 topic");
        assert_eq!(rejected.kind(), "schema-mismatch");
        assert!(rejected.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ListenerError::transient("timeout", "slow");
        assert_eq!(err.to_string(), "transient failure (timeout): slow");
    }
}
