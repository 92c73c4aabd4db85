//! Switchboard - wires configuration, storage, routing and the handler
//!
//! ```ignore
//! let mut registry = AgentRegistry::new();
//! registry.register(my_agent)?;
//!
//! let switchboard = Switchboard::new(SwitchboardConfig::default(), registry)?;
//! let events = switchboard.handle(InboundRequest::new("s1", "alice", "hello"));
//! // ...
//! switchboard.shutdown().await?;
//! ```

use std::sync::Arc;

use crate::agent::AgentRegistry;
use crate::config::{BackendKind, SwitchboardConfig};
use crate::core::SwitchboardResult;
use crate::handler::{EventStream, InboundRequest, StreamingSessionHandler};
use crate::orchestrator::Orchestrator;
use crate::state::{FileBackend, MemoryBackend, PersistenceQueue, StateBackend, StateManager};

/// One fully wired switchboard instance
///
/// Must be created inside a tokio runtime (the persistence worker is spawned
/// immediately).
pub struct Switchboard {
    config: SwitchboardConfig,
    handler: StreamingSessionHandler,
}

impl Switchboard {
    pub fn new(config: SwitchboardConfig, registry: AgentRegistry) -> SwitchboardResult<Self> {
        config.validate()?;

        let backend: Arc<dyn StateBackend> = match config.storage.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => Arc::new(FileBackend::with_dir(&config.storage.directory)),
        };

        let state = Arc::new(
            StateManager::new(backend)
                .with_cache_ttl(config.storage.cache_ttl())
                .with_memory_config(config.memory.clone()),
        );
        let orchestrator = Arc::new(Orchestrator::with_config(registry, config.routing.clone()));
        let queue = Arc::new(PersistenceQueue::spawn(
            state.clone(),
            config.persistence.clone(),
        ));

        let handler = StreamingSessionHandler::new(orchestrator, state, queue)
            .with_history_window(config.routing.history_window);

        tracing::info!(
            "[Switchboard] Ready: {} agents, {:?} storage",
            handler.orchestrator().registry().len(),
            config.storage.backend
        );

        Ok(Self { config, handler })
    }

    /// Handle one request; see `StreamingSessionHandler::handle`
    pub fn handle(&self, request: InboundRequest) -> EventStream {
        self.handler.handle(request)
    }

    pub fn config(&self) -> &SwitchboardConfig {
        &self.config
    }

    pub fn handler(&self) -> &StreamingSessionHandler {
        &self.handler
    }

    pub fn state(&self) -> &Arc<StateManager> {
        self.handler.state()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        self.handler.orchestrator()
    }

    pub fn queue(&self) -> &Arc<PersistenceQueue> {
        self.handler.queue()
    }

    /// Drain queued writes and stop the persistence worker
    pub async fn shutdown(&self) -> SwitchboardResult<()> {
        tracing::info!("[Switchboard] Shutting down");
        self.queue().shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, ScriptedAgent};
    use crate::config::StorageConfig;
    use crate::core::{Capability, StreamEvent, SwitchboardError};
    use crate::state::{PersistenceJob, StateContext};
    use futures::StreamExt;
    use tempfile::TempDir;

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("TechnicalAgent", "technical")
                    .with_capability(Capability::Technical)
                    .with_keywords(["code", "bug"]),
                "Look at the stack trace",
            ))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_file_storage_survives_restart() {
        let dir = TempDir::new().unwrap();
        let config = SwitchboardConfig::new().with_storage(StorageConfig::file(dir.path()));

        let switchboard = Switchboard::new(config.clone(), registry()).unwrap();
        let events: Vec<StreamEvent> = switchboard
            .handle(InboundRequest::new("s1", "alice", "there is a bug in my code"))
            .collect()
            .await;
        assert!(matches!(events.last(), Some(StreamEvent::Done(_))));
        switchboard.shutdown().await.unwrap();

        let restarted = Switchboard::new(config, registry()).unwrap();
        let state = restarted
            .state()
            .get_session_state("s1", &StateContext::new("alice"))
            .await
            .unwrap();
        assert_eq!(state.message_history.len(), 2);
        assert_eq!(state.last_agent(), Some("TechnicalAgent"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_queue() {
        let switchboard = Switchboard::new(SwitchboardConfig::default(), registry()).unwrap();
        switchboard.shutdown().await.unwrap();

        let err = switchboard
            .queue()
            .enqueue(PersistenceJob::share_memory("s1", StateContext::system()))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let mut config = SwitchboardConfig::default();
        config.streaming.chunk_words = 0;
        assert!(Switchboard::new(config, registry()).is_err());
    }
}
