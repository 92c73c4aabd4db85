//! Forced-route override

use crate::agent::AgentRegistry;

use super::strategy::{SelectionContext, SelectionResult, SelectionStrategy};

pub const FORCED_STRATEGY: &str = "forced";

/// Honors a caller-requested agent, bypassing scoring
///
/// Tries `agent_type` then `command_name`, each through the registry's
/// name/type/substring resolution. Declines when nothing resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedStrategy;

impl SelectionStrategy for ForcedStrategy {
    fn name(&self) -> &str {
        FORCED_STRATEGY
    }

    fn select(
        &self,
        _input: &str,
        ctx: &SelectionContext,
        registry: &AgentRegistry,
    ) -> Option<SelectionResult> {
        let forced = ctx.forced.as_ref()?;

        forced.candidates().find_map(|name| {
            registry.resolve(name).map(|entry| {
                SelectionResult::new(
                    entry,
                    1.0,
                    format!("Forced route to {} (requested '{}')", entry.descriptor().name, name),
                    FORCED_STRATEGY,
                )
                .with_requested_override(forced.requested())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, ScriptedAgent};
    use crate::routing::ForcedRoute;

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for (name, agent_type) in [("AnalyticalAgent", "analytical"), ("CreativeAgent", "creative")] {
            registry
                .register(ScriptedAgent::new(AgentDescriptor::new(name, agent_type), "ok"))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_forced_by_type() {
        let ctx = SelectionContext::new("s1").with_forced(ForcedRoute::agent_type("creative"));
        let result = ForcedStrategy.select("analyze data", &ctx, &registry()).unwrap();

        assert_eq!(result.selected_agent, "CreativeAgent");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.requested_override.as_deref(), Some("creative"));
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_command_name_tried_second() {
        let ctx = SelectionContext::new("s1").with_forced(ForcedRoute {
            agent_type: Some("billing".into()),
            command_name: Some("analytic".into()),
        });
        let result = ForcedStrategy.select("hi", &ctx, &registry()).unwrap();
        assert_eq!(result.selected_agent, "AnalyticalAgent");
    }

    #[test]
    fn test_unknown_declines() {
        let ctx = SelectionContext::new("s1").with_forced(ForcedRoute::agent_type("BillingAgent"));
        assert!(ForcedStrategy.select("hi", &ctx, &registry()).is_none());
        assert!(ForcedStrategy
            .select("hi", &SelectionContext::new("s1"), &registry())
            .is_none());
    }
}
