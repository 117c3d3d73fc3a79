//! SD-007: Record lookup. Resolve a system by key or by hostname.
//!
//! The provisioning API answers "no match" with several shapes (null, empty
//! string, `~`, empty list); all of them resolve to `None`.

use super::config::{ClientConfig, ConfigError};
use super::executor::QueryExecutor;
use super::record::TrackedRecord;
use crate::transport::http::HttpConnector;
use crate::transport::{Connector, RpcError};
use serde_json::{json, Value};

/// Remote method listing system keys that match a criteria struct.
pub const FIND_METHOD: &str = "find_system";
/// Remote method returning one system record.
pub const GET_METHOD: &str = "get_system";

/// Looks up system records through a `QueryExecutor`.
pub struct RecordClient<C: Connector = HttpConnector> {
    executor: QueryExecutor<C>,
}

impl RecordClient<HttpConnector> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(QueryExecutor::from_config(config)?))
    }
}

impl<C: Connector> RecordClient<C> {
    pub fn new(executor: QueryExecutor<C>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor<C> {
        &self.executor
    }

    /// Resolve by hostname when the identifier is dotted, otherwise by key.
    pub fn resolve(&mut self, identifier: &str) -> Result<Option<TrackedRecord>, RpcError> {
        if identifier.contains('.') {
            self.resolve_by_hostname(identifier)
        } else {
            self.resolve_by_key(identifier)
        }
    }

    /// Resolve, falling back to an empty record on a miss.
    pub fn resolve_or_new(&mut self, identifier: &str) -> Result<TrackedRecord, RpcError> {
        Ok(self.resolve(identifier)?.unwrap_or_default())
    }

    /// Keys matching `criteria`; sentinel answers yield an empty list.
    pub fn find(&mut self, criteria: &Value) -> Result<Vec<String>, RpcError> {
        let answer = self.executor.invoke(FIND_METHOD, &[criteria.clone()])?;
        Ok(candidate_keys(answer))
    }

    pub fn resolve_by_hostname(
        &mut self,
        hostname: &str,
    ) -> Result<Option<TrackedRecord>, RpcError> {
        let keys = self.find(&json!({ "hostname": hostname }))?;
        match keys.first() {
            Some(key) => {
                tracing::info!(hostname, key = %key, "hostname resolved");
                self.resolve_by_key(key)
            }
            None => {
                tracing::info!(hostname, "no system matches hostname");
                Ok(None)
            }
        }
    }

    pub fn resolve_by_key(&mut self, key: &str) -> Result<Option<TrackedRecord>, RpcError> {
        match self.executor.invoke(GET_METHOD, &[json!(key)])? {
            Some(Value::Object(raw)) => Ok(Some(TrackedRecord::from_mapping(&raw))),
            other => {
                tracing::info!(key, response = ?other, "no system record for key");
                Ok(None)
            }
        }
    }
}

/// Normalize a `find_system` answer into candidate keys.
pub fn candidate_keys(answer: Option<Value>) -> Vec<String> {
    match answer {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !is_sentinel(&s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !is_sentinel(&s) => vec![s],
        _ => Vec::new(),
    }
}

fn is_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "~"
}
