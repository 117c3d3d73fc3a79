//! SD-010: Transport abstraction. XML-RPC calls against the provisioning API.
//!
//! A `Connector` turns an `Endpoint` into a `Transport` once; the executor
//! keeps that transport for its lifetime.

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod xmlrpc;

use crate::core::config::ConfigError;
use serde_json::Value;
use std::fmt;
use url::Url;

/// Remote API location, split the way the transport needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parse a URL-like string such as `http://cobbler.lan/cobbler_api`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidUrl {
            input: input.to_string(),
        };
        let url = Url::parse(input.trim()).map_err(|_| invalid())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid());
        }
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let port = url.port_or_known_default().ok_or_else(invalid)?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
            path: url.path().to_string(),
        })
    }

    /// Full URL the transport posts to.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// Non-success HTTP status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Connection or socket failure.
    #[error("transport error: {0}")]
    Io(String),

    /// Response body was not a well-formed XML-RPC response.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The remote method raised a fault.
    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },

    /// The request could not be encoded.
    #[error("cannot encode request: {0}")]
    Encode(String),
}

impl RpcError {
    /// Transport-level failures are retried; faults and encoding errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Io(_) | Self::Decode(_))
    }
}

/// An established connection that can invoke remote methods.
pub trait Transport {
    fn call(&mut self, method: &str, params: &[Value]) -> Result<Value, RpcError>;
}

/// Establishes transports for an endpoint.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, endpoint: &Endpoint) -> Self::Transport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sd010_parse_default_endpoint() {
        let ep = Endpoint::parse("http://localhost/cobbler_api").unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 80);
        assert_eq!(ep.path, "/cobbler_api");
        assert_eq!(ep.url(), "http://localhost:80/cobbler_api");
    }

    #[test]
    fn test_sd010_parse_explicit_port_https() {
        let ep = Endpoint::parse("https://cobbler.lan:8443/api").unwrap();
        assert_eq!(ep.scheme, "https");
        assert_eq!(ep.port, 8443);
        assert_eq!(ep.path, "/api");
    }

    #[test]
    fn test_sd010_parse_invalid() {
        for bad in ["not a url", "", "ftp://host/x", "http://"] {
            let err = Endpoint::parse(bad).unwrap_err();
            assert!(
                err.to_string().contains(&format!("'{}'", bad)),
                "message should name input: {}",
                err
            );
        }
    }

    #[test]
    fn test_sd010_retry_classification() {
        assert!(RpcError::Http { status: 502 }.is_retryable());
        assert!(RpcError::Io("refused".into()).is_retryable());
        assert!(RpcError::Decode("eof".into()).is_retryable());
        let fault = RpcError::Fault {
            code: 1,
            message: "no".into(),
        };
        assert!(!fault.is_retryable());
        assert!(!RpcError::Encode("bad".into()).is_retryable());
    }
}
