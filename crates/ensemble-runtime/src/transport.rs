//! Transport used to reach model services.
//!
//! The dispatcher and health monitor only see [`ModelTransport`]; the HTTP
//! implementation lives here and tests substitute a scripted one.

use std::time::Duration;

use async_trait::async_trait;
use ensemble_core::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// A remote call with a per-call timeout.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// POST a JSON body and return the decoded response.
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value>;

    /// GET a URL; any 2xx response counts as success.
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value>;
}

/// [`ModelTransport`] over HTTP with a shared connection pool.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn read_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Request failed with status code {}: {}",
                status.as_u16(),
                text
            )));
        }

        // Non-JSON bodies are kept verbatim
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn request_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Upstream(format!("timeout of {}ms exceeded", timeout.as_millis()))
    } else {
        Error::Upstream(err.to_string())
    }
}

#[async_trait]
impl ModelTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;
        Self::read_response(response).await
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;
        Self::read_response(response).await
    }
}
