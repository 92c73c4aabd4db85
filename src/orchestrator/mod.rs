//! Orchestrator - picks an agent for each input and runs it
//!
//! The orchestrator is responsible for:
//! - Owning the agent registry
//! - Running the selection strategies (forced, continuity, capability)
//! - Delegating a task to an agent on its own tokio task
//! - Normalizing agent failures into `DelegationResult`s

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRegistry, AgentResponse};
use crate::config::RoutingConfig;
use crate::core::{AgentContext, SwitchboardError, SwitchboardResult, Task};
use crate::routing::{
    CapabilityStrategy, ContinuityStrategy, ForcedStrategy, SelectionContext, SelectionResult,
    SelectionStrategy,
};
use crate::runtime::EventSink;

/// Outcome of one delegation
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationResult {
    pub success: bool,
    pub agent_name: String,
    pub response: Option<AgentResponse>,
    pub error: Option<String>,
    /// Wall-clock time spent in the agent
    pub execution_time: Duration,
}

impl DelegationResult {
    fn succeeded(agent_name: &str, response: AgentResponse, execution_time: Duration) -> Self {
        Self {
            success: true,
            agent_name: agent_name.to_string(),
            response: Some(response),
            error: None,
            execution_time,
        }
    }

    fn failed(agent_name: &str, error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            agent_name: agent_name.to_string(),
            response: None,
            error: Some(error.into()),
            execution_time,
        }
    }

    /// Final message text, if the agent succeeded
    pub fn message(&self) -> Option<&str> {
        self.response.as_ref().map(|r| r.message.as_str())
    }

    /// The failure as an error value, for callers that want `?`
    pub fn to_error(&self) -> Option<SwitchboardError> {
        self.error.as_ref().map(|message| SwitchboardError::DelegationFailure {
            agent: self.agent_name.clone(),
            message: message.clone(),
        })
    }
}

/// Registry and strategy summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub registered_agents: usize,
    pub available_strategies: Vec<String>,
}

/// Agent selection and delegation
pub struct Orchestrator {
    registry: AgentRegistry,
    forced: ForcedStrategy,
    continuity: ContinuityStrategy,
    capability: CapabilityStrategy,
}

impl Orchestrator {
    /// Create an orchestrator with default routing constants
    pub fn new(registry: AgentRegistry) -> Self {
        Self::with_config(registry, RoutingConfig::default())
    }

    pub fn with_config(registry: AgentRegistry, config: RoutingConfig) -> Self {
        Self {
            registry,
            forced: ForcedStrategy,
            continuity: ContinuityStrategy::new(config.clone()),
            capability: CapabilityStrategy::new(config),
        }
    }

    /// Register an agent (before the orchestrator is shared)
    pub fn register<A: Agent + 'static>(&mut self, agent: A) -> SwitchboardResult<()> {
        self.registry.register(agent)
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Pick an agent for the input
    ///
    /// Order: forced route, then agent lock, then keyword scoring. Only an
    /// empty registry is an error; every other outcome is a result, with
    /// `fallback_used` set when selection had to deviate.
    pub fn select_agent(&self, input: &str, ctx: &SelectionContext) -> SwitchboardResult<SelectionResult> {
        if self.registry.is_empty() {
            return Err(SwitchboardError::NoAgentsRegistered);
        }

        if let Some(result) = self.forced.select(input, ctx, &self.registry) {
            tracing::info!(
                session_id = %ctx.session_id,
                agent = %result.selected_agent,
                "[Orchestrator] Forced route"
            );
            return Ok(result);
        }

        let requested = ctx.forced.as_ref().and_then(|f| f.requested());
        if let Some(requested) = &requested {
            tracing::warn!(
                session_id = %ctx.session_id,
                requested = %requested,
                "[Orchestrator] Forced route did not resolve"
            );
        }

        let mut result = match self.continuity.select(input, ctx, &self.registry) {
            Some(result) => result,
            None => {
                let mut result = self
                    .capability
                    .select(input, ctx, &self.registry)
                    .ok_or(SwitchboardError::NoAgentsRegistered)?;

                if let Some(target) = self.continuity.lock_target(ctx) {
                    result.fallback_used = true;
                    result.reason = format!("Locked agent {} unavailable; {}", target, result.reason);
                }
                result
            }
        };

        if let Some(requested) = requested {
            result.fallback_used = true;
            result.reason = format!("Requested agent '{}' not found; {}", requested, result.reason);
            result.requested_override = Some(requested);
        }

        tracing::info!(
            session_id = %ctx.session_id,
            agent = %result.selected_agent,
            strategy = %result.strategy,
            confidence = result.confidence,
            fallback = result.fallback_used,
            "[Orchestrator] Selected agent"
        );

        Ok(result)
    }

    /// Run a task on the named agent
    ///
    /// The agent runs on its own tokio task: dropping this future does not
    /// stop it, and a panic inside the agent becomes a failed result. No
    /// retries are attempted.
    pub async fn delegate_task(
        &self,
        task: Task,
        agent_name: &str,
        context: AgentContext,
        sink: EventSink,
    ) -> DelegationResult {
        let started = Instant::now();

        let agent = match self.registry.get(agent_name) {
            Ok(agent) => agent,
            Err(e) => return DelegationResult::failed(agent_name, e.to_string(), started.elapsed()),
        };

        tracing::debug!(agent = agent_name, task_id = %task.id, "[Orchestrator] Delegating task");

        let handle = tokio::spawn(run_agent(agent, task, context, sink));
        let outcome = handle.await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(response)) => {
                tracing::info!(
                    agent = agent_name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "[Orchestrator] Delegation completed"
                );
                DelegationResult::succeeded(agent_name, response, elapsed)
            }
            Ok(Err(e)) => {
                tracing::error!(agent = agent_name, error = %e, "[Orchestrator] Agent failed");
                DelegationResult::failed(agent_name, format!("{:#}", e), elapsed)
            }
            Err(join_error) if join_error.is_panic() => {
                tracing::error!(agent = agent_name, "[Orchestrator] Agent panicked");
                DelegationResult::failed(agent_name, "Agent panicked", elapsed)
            }
            Err(join_error) => {
                DelegationResult::failed(agent_name, join_error.to_string(), elapsed)
            }
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            registered_agents: self.registry.len(),
            available_strategies: vec![
                self.forced.name().to_string(),
                self.continuity.name().to_string(),
                self.capability.name().to_string(),
            ],
        }
    }
}

async fn run_agent(
    agent: Arc<dyn Agent>,
    task: Task,
    context: AgentContext,
    sink: EventSink,
) -> anyhow::Result<AgentResponse> {
    agent.process_message(task, context, sink).await
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, ScriptedAgent};
    use crate::core::{Capability, StreamEvent};
    use crate::routing::{ForcedRoute, CONTINUITY_STRATEGY, FALLBACK_STRATEGY};
    use crate::runtime::create_event_channel;
    use crate::state::{AgentInteraction, UserPreferences};
    use async_trait::async_trait;

    fn orchestrator() -> Orchestrator {
        let mut orchestrator = Orchestrator::new(AgentRegistry::new());
        orchestrator
            .register(ScriptedAgent::new(
                AgentDescriptor::new("AnalyticalAgent", "analytical")
                    .with_capability(Capability::Analytical)
                    .with_keywords(["analyze", "numbers", "data"]),
                "The numbers look good",
            ))
            .unwrap();
        orchestrator
            .register(ScriptedAgent::new(
                AgentDescriptor::new("CreativeAgent", "creative")
                    .with_capability(Capability::Creative)
                    .with_keywords(["poem", "story", "write"]),
                "Once upon a time",
            ))
            .unwrap();
        orchestrator
    }

    fn locked_to(agent: &str) -> SelectionContext {
        SelectionContext::new("s1")
            .with_preferences(UserPreferences {
                agent_lock: true,
                ..Default::default()
            })
            .with_history(vec![AgentInteraction::new(agent, 0.8).into_entry()])
    }

    #[test]
    fn test_empty_registry_is_an_error() {
        let orchestrator = Orchestrator::new(AgentRegistry::new());
        let err = orchestrator
            .select_agent("hi", &SelectionContext::new("s1"))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NoAgentsRegistered));
    }

    #[test]
    fn test_selection_is_total() {
        let orchestrator = orchestrator();
        for input in ["", "   ", "zzz", "Analyze the quarterly numbers", "write a story"] {
            let result = orchestrator
                .select_agent(input, &SelectionContext::new("s1"))
                .unwrap();
            assert!(orchestrator.registry().contains(&result.selected_agent));
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_analytical_then_creative() {
        let orchestrator = orchestrator();

        let first = orchestrator
            .select_agent("Analyze the quarterly numbers", &SelectionContext::new("s1"))
            .unwrap();
        assert_eq!(first.selected_agent, "AnalyticalAgent");
        assert!(!first.fallback_used);

        let second = orchestrator
            .select_agent("Now write a poem about them", &SelectionContext::new("s1"))
            .unwrap();
        assert_eq!(second.selected_agent, "CreativeAgent");
    }

    #[test]
    fn test_dataset_matches_on_analyze_only() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .select_agent("please analyze this dataset", &SelectionContext::new("s1"))
            .unwrap();

        assert_eq!(result.selected_agent, "AnalyticalAgent");
        assert!(!result.fallback_used);
        // "dataset" is not the whole word "data"
        assert!(result.reason.starts_with("Matched 1 keyword "));
        assert!((result.confidence - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_agent_lock_wins_over_keywords() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .select_agent("Analyze the quarterly numbers", &locked_to("CreativeAgent"))
            .unwrap();

        assert_eq!(result.selected_agent, "CreativeAgent");
        assert_eq!(result.strategy, CONTINUITY_STRATEGY);
        assert!(result.confidence >= 0.85);
    }

    #[test]
    fn test_broken_lock_falls_through() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .select_agent("write a poem", &locked_to("RetiredAgent"))
            .unwrap();

        assert_eq!(result.selected_agent, "CreativeAgent");
        assert!(result.fallback_used);
        assert!(result.reason.contains("RetiredAgent"));
    }

    #[test]
    fn test_forced_route() {
        let orchestrator = orchestrator();
        let ctx = SelectionContext::new("s1").with_forced(ForcedRoute::agent_type("creative"));

        let result = orchestrator.select_agent("Analyze the numbers", &ctx).unwrap();
        assert_eq!(result.selected_agent, "CreativeAgent");
        assert_eq!(result.confidence, 1.0);
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_unknown_forced_route_falls_back() {
        let orchestrator = orchestrator();
        let ctx = SelectionContext::new("s1").with_forced(ForcedRoute::agent_type("BillingAgent"));

        let result = orchestrator.select_agent("What is my balance?", &ctx).unwrap();
        assert_eq!(result.selected_agent, "AnalyticalAgent");
        assert_eq!(result.strategy, FALLBACK_STRATEGY);
        assert!(result.fallback_used);
        assert!(result.reason.contains("BillingAgent"));
        assert_eq!(result.requested_override.as_deref(), Some("BillingAgent"));
    }

    #[tokio::test]
    async fn test_delegate_streams_and_times() {
        let orchestrator = orchestrator();
        let (sink, mut rx) = create_event_channel();

        let result = orchestrator
            .delegate_task(Task::new("story"), "CreativeAgent", AgentContext::new("s1"), sink)
            .await;

        assert!(result.success);
        assert_eq!(result.message(), Some("Once upon a time"));
        assert!(result.error.is_none());

        let mut streamed = String::new();
        while let Some(StreamEvent::Token { content }) = rx.recv().await {
            streamed.push_str(&content);
        }
        assert_eq!(streamed, "Once upon a time");
    }

    #[tokio::test]
    async fn test_delegate_unknown_agent() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .delegate_task(Task::new("x"), "Nobody", AgentContext::new("s1"), EventSink::detached())
            .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Nobody"));
        assert!(matches!(
            result.to_error(),
            Some(SwitchboardError::DelegationFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_agent_error_becomes_result() {
        let mut orchestrator = Orchestrator::new(AgentRegistry::new());
        orchestrator
            .register(
                ScriptedAgent::new(AgentDescriptor::new("Flaky", "flaky"), "partial")
                    .failing_with("upstream timeout"),
            )
            .unwrap();

        let result = orchestrator
            .delegate_task(Task::new("x"), "Flaky", AgentContext::new("s1"), EventSink::detached())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("upstream timeout"));
    }

    struct PanickingAgent {
        descriptor: AgentDescriptor,
    }

    #[async_trait]
    impl Agent for PanickingAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process_message(
            &self,
            _task: Task,
            _context: AgentContext,
            _sink: EventSink,
        ) -> anyhow::Result<AgentResponse> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let mut orchestrator = Orchestrator::new(AgentRegistry::new());
        orchestrator
            .register(PanickingAgent {
                descriptor: AgentDescriptor::new("Boom", "boom"),
            })
            .unwrap();

        let result = orchestrator
            .delegate_task(Task::new("x"), "Boom", AgentContext::new("s1"), EventSink::detached())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Agent panicked"));
    }

    #[test]
    fn test_stats() {
        let stats = orchestrator().stats();
        assert_eq!(stats.registered_agents, 2);
        assert_eq!(stats.available_strategies, vec!["forced", "continuity", "capability"]);
    }
}
