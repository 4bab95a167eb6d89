//! Error types for the retry engine
//!
//! A failed delivery is not an error here: exhaustion is reported through
//! [`Outcome`](super::Outcome). These errors cover a policy that cannot be
//! built and a recovery callback that failed.

use thiserror::Error;

/// Boxed error returned by recovery callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the retry engine itself
#[derive(Debug, Error)]
pub enum RetryError {
    /// The recovery callback failed; it is never retried
    #[error("recovery callback failed after {attempts} attempts: {source}")]
    Recovery {
        /// Attempts made before recovery was invoked
        attempts: u32,
        /// The callback's failure
        source: BoxError,
    },

    /// The policy configuration was rejected
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
}

impl RetryError {
    /// Create a recovery failure error
    pub fn recovery(attempts: u32, source: BoxError) -> Self {
        RetryError::Recovery { attempts, source }
    }

    /// Create an invalid policy error
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        RetryError::InvalidPolicy(message.into())
    }

    /// Check if the recovery callback failed
    pub fn is_recovery(&self) -> bool {
        matches!(self, RetryError::Recovery { .. })
    }

    /// Attempts made before the error, if it came from a delivery
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Recovery { attempts, .. } => Some(*attempts),
            RetryError::InvalidPolicy(_) => None,
        }
    }
}
