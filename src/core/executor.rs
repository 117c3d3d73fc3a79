//! SD-006: Query executor. Remote calls with a bounded, immediate retry.
//!
//! The transport is established on first use and kept for the executor's
//! lifetime. Retryable failures are re-issued without delay until the retry
//! budget is spent, at which point the call yields no result.

use super::config::{ClientConfig, ConfigError};
use crate::transport::http::HttpConnector;
use crate::transport::{Connector, Endpoint, RpcError, Transport};
use serde_json::Value;

/// Invokes remote methods over a lazily established transport.
pub struct QueryExecutor<C: Connector = HttpConnector> {
    endpoint: Endpoint,
    connector: C,
    transport: Option<C::Transport>,
    max_retries: u32,
}

impl QueryExecutor<HttpConnector> {
    /// Build an HTTP executor from resolved configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.endpoint()?,
            config.connector(),
            config.max_retries,
        ))
    }
}

impl<C: Connector> QueryExecutor<C> {
    pub fn new(endpoint: Endpoint, connector: C, max_retries: u32) -> Self {
        Self {
            endpoint,
            connector,
            transport: None,
            max_retries,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Establish the transport if not already connected.
    pub fn connect(&mut self) -> &mut C::Transport {
        let (connector, endpoint) = (&self.connector, &self.endpoint);
        self.transport
            .get_or_insert_with(|| connector.connect(endpoint))
    }

    /// Call `action` with `params`.
    ///
    /// Returns `Ok(None)` once `max_retries` retries have failed with
    /// retryable errors. Non-retryable errors are returned immediately.
    pub fn invoke(&mut self, action: &str, params: &[Value]) -> Result<Option<Value>, RpcError> {
        let max_retries = self.max_retries;
        let transport = self.connect();
        for attempt in 0..=max_retries {
            tracing::debug!(action, attempt, "invoking");
            match transport.call(action, params) {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(action, attempt, max_retries, error = %e, "retryable failure");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::warn!(action, attempts = u64::from(max_retries) + 1, "retries exhausted");
        Ok(None)
    }
}
