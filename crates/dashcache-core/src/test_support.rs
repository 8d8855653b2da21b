//! Scripted gateway for service tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use crate::api::{GatewayError, Method, RequestGateway};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Value>,
}

struct Scripted {
    delay: Duration,
    result: Result<Value, GatewayError>,
}

/// Answers calls in order from a queue of canned results. Responses are
/// taken when `send` is called, so overlapping calls get them in call order.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ok(&self, payload: Value) -> &Self {
        self.ok_after(Duration::ZERO, payload)
    }

    pub fn ok_after(&self, delay: Duration, payload: Value) -> &Self {
        self.script.lock().push_back(Scripted {
            delay,
            result: Ok(payload),
        });
        self
    }

    pub fn fail(&self, error: GatewayError) -> &Self {
        self.fail_after(Duration::ZERO, error)
    }

    pub fn fail_after(&self, delay: Duration, error: GatewayError) -> &Self {
        self.script.lock().push_back(Scripted {
            delay,
            result: Err(error),
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl RequestGateway for ScriptedGateway {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        method: Method,
        body: Option<&'a Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        self.calls.lock().push(Call {
            endpoint: endpoint.to_string(),
            method,
            body: body.cloned(),
        });
        let next = self.script.lock().pop_front();
        Box::pin(async move {
            match next {
                Some(Scripted { delay, result }) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    result
                }
                None => Err(GatewayError::Network(format!(
                    "no scripted response for {} {}",
                    method, endpoint
                ))),
            }
        })
    }
}
