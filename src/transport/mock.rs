//! Scripted connector for exercising the executor and client without a server.

use super::{Connector, Endpoint, RpcError, Transport};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared script state, visible to the test after the executor takes the connector.
#[derive(Debug, Default)]
pub struct Script {
    pub responses: RefCell<VecDeque<Result<Value, RpcError>>>,
    pub calls: RefCell<Vec<(String, Vec<Value>)>>,
    pub connects: Cell<usize>,
}

impl Script {
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    pub script: Rc<Script>,
}

impl ScriptedConnector {
    pub fn new(responses: Vec<Result<Value, RpcError>>) -> Self {
        let script = Script {
            responses: RefCell::new(responses.into()),
            ..Script::default()
        };
        Self {
            script: Rc::new(script),
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self, _endpoint: &Endpoint) -> ScriptedTransport {
        self.script.connects.set(self.script.connects.get() + 1);
        ScriptedTransport {
            script: Rc::clone(&self.script),
        }
    }
}

pub struct ScriptedTransport {
    script: Rc<Script>,
}

impl Transport for ScriptedTransport {
    fn call(&mut self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.script
            .calls
            .borrow_mut()
            .push((method.to_string(), params.to_vec()));
        self.script
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::Io("script exhausted".to_string())))
    }
}
