//! Scripted transport for exercising the dispatcher and health monitor
//! without live model services.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ensemble_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;

use crate::transport::ModelTransport;

/// Scripted reply for a URL.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond immediately with this payload.
    Json(Value),
    /// Respond with this payload after a delay.
    Delayed(Duration, Value),
    /// Fail immediately with this message.
    Fail(String),
    /// Never respond.
    Hang,
}

/// Transport that answers from a URL → reply table and records every call.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply for `url` (builder form).
    pub fn with(self, url: &str, reply: MockReply) -> Self {
        self.set(url, reply);
        self
    }

    /// Script or replace the reply for `url`.
    pub fn set(&self, url: &str, reply: MockReply) {
        self.replies.lock().insert(url.to_string(), reply);
    }

    /// URLs called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == url).count()
    }

    async fn answer(&self, url: &str) -> Result<Value> {
        self.calls.lock().push(url.to_string());
        let reply = self.replies.lock().get(url).cloned();
        match reply {
            Some(MockReply::Json(value)) => Ok(value),
            Some(MockReply::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(MockReply::Fail(message)) => Err(Error::Upstream(message)),
            Some(MockReply::Hang) => futures::future::pending().await,
            None => Err(Error::Upstream(format!("connect ECONNREFUSED {}", url))),
        }
    }
}

#[async_trait]
impl ModelTransport for MockTransport {
    async fn post_json(&self, url: &str, _body: &Value, _timeout: Duration) -> Result<Value> {
        self.answer(url).await
    }

    async fn get_json(&self, url: &str, _timeout: Duration) -> Result<Value> {
        self.answer(url).await
    }
}
