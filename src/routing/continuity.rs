//! Agent lock: keep answering with the same agent across turns

use crate::agent::AgentRegistry;
use crate::config::RoutingConfig;

use super::capability::CapabilityStrategy;
use super::strategy::{SelectionContext, SelectionResult, SelectionStrategy};

pub const CONTINUITY_STRATEGY: &str = "continuity";

/// Reselects the previous agent while `agent_lock` is on
///
/// Declines when the lock is off, when there is no previous or preferred
/// agent, or when that agent is unregistered or cannot handle the task type.
#[derive(Debug, Clone)]
pub struct ContinuityStrategy {
    floor: f32,
    scoring: CapabilityStrategy,
}

impl ContinuityStrategy {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            floor: config.continuity_floor,
            scoring: CapabilityStrategy::new(config),
        }
    }

    /// Agent the lock points at, if the lock is on
    pub fn lock_target<'a>(&self, ctx: &'a SelectionContext) -> Option<&'a str> {
        if !ctx.preferences.agent_lock {
            return None;
        }
        ctx.last_agent()
            .or(ctx.preferences.preferred_agent.as_deref())
    }
}

impl Default for ContinuityStrategy {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl SelectionStrategy for ContinuityStrategy {
    fn name(&self) -> &str {
        CONTINUITY_STRATEGY
    }

    fn select(
        &self,
        input: &str,
        ctx: &SelectionContext,
        registry: &AgentRegistry,
    ) -> Option<SelectionResult> {
        let target = self.lock_target(ctx)?;

        let Some(entry) = registry.entry(target) else {
            tracing::warn!(session_id = %ctx.session_id, agent = target, "Locked agent is not registered");
            return None;
        };

        if !entry.descriptor().supports(&ctx.effective_task_type()) {
            tracing::warn!(
                session_id = %ctx.session_id,
                agent = target,
                task_type = %ctx.effective_task_type(),
                "Locked agent cannot handle task type"
            );
            return None;
        }

        let confidence = self
            .scoring
            .confidence_for(entry.score(input))
            .max(self.floor);

        Some(SelectionResult::new(
            entry,
            confidence,
            format!("Agent lock: continuing with {}", target),
            CONTINUITY_STRATEGY,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, ScriptedAgent};
    use crate::core::Capability;
    use crate::state::{AgentInteraction, UserPreferences};

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("AnalyticalAgent", "analytical")
                    .with_capability(Capability::Analytical)
                    .with_keywords(["analyze"]),
                "a",
            ))
            .unwrap();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("CreativeAgent", "creative").with_capability(Capability::Creative),
                "c",
            ))
            .unwrap();
        registry
    }

    fn locked(history: &[&str], preferred: Option<&str>) -> SelectionContext {
        let preferences = UserPreferences {
            agent_lock: true,
            preferred_agent: preferred.map(str::to_string),
            ..Default::default()
        };
        SelectionContext::new("s1")
            .with_preferences(preferences)
            .with_history(
                history
                    .iter()
                    .map(|name| AgentInteraction::new(*name, 0.7).into_entry())
                    .collect(),
            )
    }

    #[test]
    fn test_lock_keeps_previous_agent() {
        let strategy = ContinuityStrategy::new(RoutingConfig::default());
        let result = strategy
            .select("analyze the numbers", &locked(&["CreativeAgent"], None), &registry())
            .unwrap();

        assert_eq!(result.selected_agent, "CreativeAgent");
        assert_eq!(result.strategy, CONTINUITY_STRATEGY);
        assert!((result.confidence - 0.85).abs() < 1e-6);
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_lock_off_declines() {
        let strategy = ContinuityStrategy::new(RoutingConfig::default());
        let mut ctx = locked(&["CreativeAgent"], None);
        ctx.preferences.agent_lock = false;

        assert!(strategy.select("hi", &ctx, &registry()).is_none());
        assert!(strategy.lock_target(&ctx).is_none());
    }

    #[test]
    fn test_preferred_agent_when_history_empty() {
        let strategy = ContinuityStrategy::new(RoutingConfig::default());
        let result = strategy
            .select("hi", &locked(&[], Some("AnalyticalAgent")), &registry())
            .unwrap();
        assert_eq!(result.selected_agent, "AnalyticalAgent");
    }

    #[test]
    fn test_unregistered_or_incapable_declines() {
        let strategy = ContinuityStrategy::new(RoutingConfig::default());

        let gone = locked(&["RetiredAgent"], None);
        assert_eq!(strategy.lock_target(&gone), Some("RetiredAgent"));
        assert!(strategy.select("hi", &gone, &registry()).is_none());

        let incapable = locked(&["CreativeAgent"], None).with_task_type(Capability::Analytical);
        assert!(strategy.select("hi", &incapable, &registry()).is_none());
    }
}
