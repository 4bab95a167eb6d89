//! Consumer client factory
//!
//! A single [`ClientFactory`] capability covers both plain creation and
//! creation with a client-id suffix (one client per partition-owning task).

use std::fmt;

use super::config::{is_auto_commit_enabled, ClientConfig};
use crate::error::Result;

/// Builds broker clients from a base [`ClientConfig`]
pub trait ClientFactory {
    /// The client type produced
    type Client;

    /// The base configuration every client starts from
    fn config(&self) -> &ClientConfig;

    /// Build a client from a fully resolved configuration
    fn build(&self, config: ClientConfig) -> Result<Self::Client>;

    /// Create a client from the base configuration
    fn create(&self) -> Result<Self::Client> {
        self.build(self.config().clone())
    }

    /// Create a client whose id is the base id followed by `suffix`
    ///
    /// Falls back to [`ClientFactory::create`] when the base configuration
    /// has no client id or no suffix is given.
    fn create_with_suffix(&self, suffix: Option<&str>) -> Result<Self::Client> {
        if suffix.is_none() || self.config().client_id().is_none() {
            return self.create();
        }
        self.build(self.config().with_client_id_suffix(suffix))
    }

    /// Whether clients from this factory commit offsets automatically
    fn is_auto_commit(&self) -> bool {
        is_auto_commit_enabled(self.config())
    }
}

type Builder<C> = Box<dyn Fn(ClientConfig) -> Result<C> + Send + Sync>;

/// Factory that delegates client construction to a closure
///
/// # Example
///
/// ```rust
/// use redeliver_core::client::{ClientConfig, ClientFactory, ConsumerFactory, CLIENT_ID_CONFIG};
///
/// let factory = ConsumerFactory::new(
///     ClientConfig::new().with(CLIENT_ID_CONFIG, "c1"),
///     |config| Ok(config.client_id()),
/// );
///
/// let id = factory.create_with_suffix(Some("-0")).unwrap();
/// assert_eq!(id.as_deref(), Some("c1-0"));
/// ```
pub struct ConsumerFactory<C> {
    config: ClientConfig,
    builder: Builder<C>,
}

impl<C> ConsumerFactory<C> {
    pub fn new<F>(config: ClientConfig, builder: F) -> Self
    where
        F: Fn(ClientConfig) -> Result<C> + Send + Sync + 'static,
    {
        Self {
            config,
            builder: Box::new(builder),
        }
    }
}

impl<C> fmt::Debug for ConsumerFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C> ClientFactory for ConsumerFactory<C> {
    type Client = C;

    fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build(&self, config: ClientConfig) -> Result<C> {
        tracing::debug!(client_id = ?config.client_id(), "creating consumer client");
        (self.builder)(config)
    }
}
