//! Legacy backend integration
//!
//! Older backends only know "send text, get text". `LegacyAgentAdapter`
//! turns any `LegacyBackend` into an `Agent`, replaying the complete reply as
//! a token stream so callers see the same event protocol for every agent.

pub mod adapter;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::MessageEntry;

pub use adapter::LegacyAgentAdapter;
pub use webhook::WebhookBackend;

/// What a legacy backend receives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub message: String,
    /// Recent conversation, oldest first
    #[serde(default)]
    pub history: Vec<MessageEntry>,
}

/// A backend that answers a whole message at once
#[async_trait]
pub trait LegacyBackend: Send + Sync {
    /// Short name for logs and the default agent name
    fn name(&self) -> &str;

    async fn send(&self, request: LegacyRequest) -> Result<String>;
}

/// In-process backend backed by a plain function
pub struct FnBackend<F> {
    name: String,
    handler: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&LegacyRequest) -> Result<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F> LegacyBackend for FnBackend<F>
where
    F: Fn(&LegacyRequest) -> Result<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: LegacyRequest) -> Result<String> {
        (self.handler)(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_backend() {
        let backend = FnBackend::new("echo", |req: &LegacyRequest| Ok(format!("echo: {}", req.message)));

        let reply = backend
            .send(LegacyRequest {
                session_id: "s1".into(),
                message: "ping".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(backend.name(), "echo");
        assert_eq!(reply, "echo: ping");
    }
}
