//! SD-012: XML-RPC over HTTP.
//!
//! One `ureq` agent per transport; requests are blocking POSTs of
//! `text/xml` bodies to the endpoint path.

use super::{xmlrpc, Connector, Endpoint, RpcError, Transport};
use serde_json::Value;
use std::time::Duration;

/// Builds HTTP transports with fixed timeouts.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, endpoint: &Endpoint) -> HttpTransport {
        tracing::debug!(endpoint = %endpoint, "connecting");
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .timeout_read(self.read_timeout)
            .build();
        HttpTransport {
            agent,
            url: endpoint.url(),
        }
    }
}

/// An HTTP agent bound to one endpoint.
pub struct HttpTransport {
    agent: ureq::Agent,
    url: String,
}

impl Transport for HttpTransport {
    fn call(&mut self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let body = xmlrpc::encode_call(method, params)?;
        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", "text/xml")
            .send_string(&body);
        let text = match response {
            Ok(r) => r
                .into_string()
                .map_err(|e| RpcError::Io(format!("read error: {}", e)))?,
            Err(ureq::Error::Status(status, _)) => return Err(RpcError::Http { status }),
            Err(ureq::Error::Transport(t)) => return Err(RpcError::Io(t.to_string())),
        };
        xmlrpc::decode_response(&text)
    }
}
