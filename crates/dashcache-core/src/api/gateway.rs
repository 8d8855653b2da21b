use std::fmt;

use futures::future::BoxFuture;
use serde_json::Value;

use super::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Transport seam between the services and the remote API.
///
/// Implementations own everything about the wire: base URLs, auth headers,
/// timeouts and any retry policy. The services never retry a failed call.
pub trait RequestGateway: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        method: Method,
        body: Option<&'a Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>>;
}
