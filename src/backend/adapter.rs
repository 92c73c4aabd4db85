//! LegacyAgentAdapter - exposes a legacy backend as an agent

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::agent::{Agent, AgentDescriptor, AgentResponse};
use crate::config::StreamingConfig;
use crate::core::{AgentContext, Capability, Task};
use crate::runtime::EventSink;

use super::{LegacyBackend, LegacyRequest};

/// Base score for adapters: broad but easily outscored by specialists
pub const ADAPTER_BASE_SCORE: f32 = 0.25;

/// Split text into chunks of `words` words, keeping the original spacing
pub fn chunk_words(text: &str, words: usize) -> Vec<String> {
    let words = words.max(1);
    let pieces: Vec<&str> = text.split_inclusive(' ').collect();
    pieces.chunks(words).map(|chunk| chunk.concat()).collect()
}

/// Agent wrapper around a `LegacyBackend`
///
/// The backend's reply is streamed as fixed-size word chunks at a fixed
/// cadence once it arrives.
pub struct LegacyAgentAdapter<B> {
    backend: B,
    descriptor: AgentDescriptor,
    streaming: StreamingConfig,
}

impl<B: LegacyBackend> LegacyAgentAdapter<B> {
    /// Wrap a backend with a broad `General` descriptor named after it
    pub fn new(backend: B) -> Self {
        let descriptor = AgentDescriptor::new(backend.name(), "legacy")
            .with_capability(Capability::General)
            .with_base_score(ADAPTER_BASE_SCORE)
            .with_description(format!("Legacy backend '{}'", backend.name()));

        Self {
            backend,
            descriptor,
            streaming: StreamingConfig::default(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: AgentDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: LegacyBackend> Agent for LegacyAgentAdapter<B> {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process_message(
        &self,
        task: Task,
        context: AgentContext,
        sink: EventSink,
    ) -> Result<AgentResponse> {
        let request = LegacyRequest {
            session_id: context.session_id,
            user_id: context.user_id,
            message: task.input,
            history: context.recent_messages,
        };

        let reply = self
            .backend
            .send(request)
            .await
            .with_context(|| format!("Legacy backend '{}' failed", self.backend.name()))?;

        let delay = self.streaming.chunk_delay();
        for (i, chunk) in chunk_words(&reply, self.streaming.chunk_words).into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            sink.send_token(chunk);
        }

        Ok(AgentResponse::new(reply).with_metadata("backend", self.backend.name()))
    }
}
