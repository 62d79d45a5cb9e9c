//! How the form engine reaches backend actions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// In-process dispatch through a [`Dispatcher`](crate::dispatch::Dispatcher).
pub mod local;

/// Dispatch over HTTP to a running tester server.
#[cfg(feature = "http-client")]
pub mod http;

pub use local::LocalTransport;

#[cfg(feature = "http-client")]
pub use http::HttpTransport;

/// One action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    /// Non-success HTTP answer.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The dispatcher reported a structured failure.
    #[error("{message}")]
    Dispatch { kind: String, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Sends dispatch requests and returns the raw action result.
#[async_trait]
pub trait ActionTransport: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, TransportError>;
}
