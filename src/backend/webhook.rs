//! WebhookBackend - legacy backend reached over HTTP
//!
//! Posts the request as JSON and reads the reply from the first of the
//! `response`, `message` or `text` fields. A non-JSON body is taken verbatim.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{LegacyBackend, LegacyRequest};

/// Reply fields, in lookup order
const REPLY_FIELDS: [&str; 3] = ["response", "message", "text"];

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    message: &'a str,
    history: Vec<WireMessage<'a>>,
}

impl<'a> From<&'a LegacyRequest> for WireRequest<'a> {
    fn from(request: &'a LegacyRequest) -> Self {
        Self {
            session_id: &request.session_id,
            user_id: request.user_id.as_deref(),
            message: &request.message,
            history: request
                .history
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }
}

/// Pull the reply text out of a response body
pub fn extract_reply(body: &str) -> Result<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Ok(body.to_string()),
    };

    match &value {
        Value::String(text) => Ok(text.clone()),
        Value::Object(map) => REPLY_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .with_context(|| {
                format!("Response has none of the fields {:?}", REPLY_FIELDS)
            }),
        other => bail!("Unexpected response body: {}", other),
    }
}

/// Legacy backend behind an HTTP endpoint
pub struct WebhookBackend {
    name: String,
    url: String,
    client: Client,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl WebhookBackend {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: Client::new(),
            bearer_token: None,
            timeout: None,
        }
    }

    /// Reuse an existing HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LegacyBackend for WebhookBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: LegacyRequest) -> Result<String> {
        let mut builder = self.client.post(&self.url).json(&WireRequest::from(&request));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!("[Webhook] POST {} for session {}", self.url, request.session_id);

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            bail!("{} returned {}: {}", self.url, status, body);
        }

        extract_reply(&body)
    }
}
