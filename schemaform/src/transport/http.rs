use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::{
    schema::SchemaPair,
    transport::{ActionTransport, DispatchRequest, TransportError},
};

/// Talks to a running tester server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `base_url` like `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpTransport {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        read_json(response).await
    }

    /// Schemas currently served, uploaded pair first.
    pub async fn fetch_schemas(&self) -> Result<SchemaPair, TransportError> {
        let value = self.get_json("/api/schemas").await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Persisted parameters, empty when the server has none.
    pub async fn fetch_config(&self) -> Result<Map<String, Value>, TransportError> {
        match self.get_json("/api/config").await? {
            Value::Object(map) => Ok(map),
            other => Err(TransportError::Decode(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::Request(e.to_string()))?;
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl ActionTransport for HttpTransport {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, TransportError> {
        let url = format!("{}/sync-action", self.base_url);
        debug!("POST {url} action={}", request.action);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let transport = HttpTransport::new("http://localhost:8000/");
        assert_eq!(transport.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let transport = HttpTransport::new("http://127.0.0.1:9");
        let err = transport
            .dispatch(DispatchRequest {
                action: "testConnection".into(),
                parameters: Map::new(),
                component_path: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
