//! Keyword and capability scoring
//!
//! score = keywords, aliases and capability labels found in the input
//!         + the agent's base score
//! confidence = min(ceiling, 0.5 + 0.15 * score)

use crate::agent::{AgentRegistry, RegisteredAgent};
use crate::config::RoutingConfig;

use super::strategy::{SelectionContext, SelectionResult, SelectionStrategy};

pub const CAPABILITY_STRATEGY: &str = "capability";
pub const FALLBACK_STRATEGY: &str = "fallback";

/// Default strategy: highest keyword score wins
///
/// Always produces a result for a non-empty registry. When nothing reaches
/// the minimum score the first registered capable agent is chosen with
/// `fallback_used` set.
#[derive(Debug, Clone, Default)]
pub struct CapabilityStrategy {
    config: RoutingConfig,
}

impl CapabilityStrategy {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn confidence_for(&self, score: f32) -> f32 {
        (0.5 + 0.15 * score).min(self.config.confidence_ceiling)
    }

    /// Best scoring capable agent; earlier registration wins ties
    pub fn best_match<'a>(
        &self,
        input: &str,
        ctx: &SelectionContext,
        registry: &'a AgentRegistry,
    ) -> Option<(&'a RegisteredAgent, f32)> {
        let task_type = ctx.effective_task_type();
        let mut best: Option<(&RegisteredAgent, f32)> = None;

        for entry in registry.iter().filter(|e| e.descriptor().supports(&task_type)) {
            let score = entry.score(input);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }

        best
    }

    fn fallback(&self, ctx: &SelectionContext, registry: &AgentRegistry) -> Option<SelectionResult> {
        let task_type = ctx.effective_task_type();
        let entry = registry
            .iter()
            .find(|e| e.descriptor().supports(&task_type))
            .or_else(|| registry.first())?;

        tracing::warn!(
            session_id = %ctx.session_id,
            agent = %entry.descriptor().name,
            "No agent matched the input, using fallback"
        );

        Some(
            SelectionResult::new(
                entry,
                self.config.fallback_confidence,
                "No specific match; using default agent",
                FALLBACK_STRATEGY,
            )
            .with_fallback(true),
        )
    }
}

impl SelectionStrategy for CapabilityStrategy {
    fn name(&self) -> &str {
        CAPABILITY_STRATEGY
    }

    fn select(
        &self,
        input: &str,
        ctx: &SelectionContext,
        registry: &AgentRegistry,
    ) -> Option<SelectionResult> {
        match self.best_match(input, ctx, registry) {
            Some((entry, score)) if score >= self.config.min_score => {
                let hits = entry.keyword_hits(input);
                let reason = format!(
                    "Matched {} keyword{} (score {:.2})",
                    hits,
                    if hits == 1 { "" } else { "s" },
                    score
                );
                Some(SelectionResult::new(
                    entry,
                    self.confidence_for(score),
                    reason,
                    CAPABILITY_STRATEGY,
                ))
            }
            _ => self.fallback(ctx, registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, ScriptedAgent};
    use crate::core::Capability;

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("AnalyticalAgent", "analytical")
                    .with_capability(Capability::Analytical)
                    .with_keywords(["analyze", "data", "numbers", "statistics"]),
                "analysis",
            ))
            .unwrap();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("CreativeAgent", "creative")
                    .with_capability(Capability::Creative)
                    .with_keywords(["poem", "story", "write"]),
                "prose",
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_keyword_match() {
        let strategy = CapabilityStrategy::default();
        let result = strategy
            .select("Analyze the quarterly numbers", &SelectionContext::new("s1"), &registry())
            .unwrap();

        assert_eq!(result.selected_agent, "AnalyticalAgent");
        assert!(!result.fallback_used);
        assert_eq!(result.strategy, CAPABILITY_STRATEGY);
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_creative_match() {
        let strategy = CapabilityStrategy::default();
        let result = strategy
            .select("Write a poem about the sea", &SelectionContext::new("s1"), &registry())
            .unwrap();
        assert_eq!(result.selected_agent, "CreativeAgent");
    }

    #[test]
    fn test_confidence_ceiling() {
        let strategy = CapabilityStrategy::default();
        assert!((strategy.confidence_for(1.0) - 0.65).abs() < 1e-6);
        assert!((strategy.confidence_for(10.0) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_no_match_falls_back_to_first() {
        let strategy = CapabilityStrategy::default();
        let result = strategy
            .select("hello there", &SelectionContext::new("s1"), &registry())
            .unwrap();

        assert_eq!(result.selected_agent, "AnalyticalAgent");
        assert!(result.fallback_used);
        assert_eq!(result.strategy, FALLBACK_STRATEGY);
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ties_go_to_registration_order() {
        let strategy = CapabilityStrategy::default();
        let result = strategy
            .select("write about data", &SelectionContext::new("s1"), &registry())
            .unwrap();
        assert_eq!(result.selected_agent, "AnalyticalAgent");
    }

    #[test]
    fn test_task_type_filters_candidates() {
        let strategy = CapabilityStrategy::default();
        let ctx = SelectionContext::new("s1").with_task_type(Capability::Creative);

        let result = strategy.select("analyze the data", &ctx, &registry()).unwrap();
        assert_eq!(result.selected_agent, "CreativeAgent");
        assert!(result.fallback_used);
    }

    #[test]
    fn test_base_score_counts() {
        let mut registry = registry();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("Generalist", "general")
                    .with_capability(Capability::General)
                    .with_base_score(1.0),
                "anything",
            ))
            .unwrap();

        let result = CapabilityStrategy::default()
            .select("hello there", &SelectionContext::new("s1"), &registry)
            .unwrap();
        assert_eq!(result.selected_agent, "Generalist");
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_empty_registry_declines() {
        let strategy = CapabilityStrategy::default();
        assert!(strategy
            .select("anything", &SelectionContext::new("s1"), &AgentRegistry::new())
            .is_none());
    }
}
