//! Agent registry
//!
//! Holds every routable agent in registration order. Registration order is
//! the tie-breaker for equal routing scores and picks the fallback agent, so
//! agents are kept in a `Vec` with a name index on the side.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{SwitchboardError, SwitchboardResult};
use crate::routing::KeywordMatcher;

use super::agent::{Agent, AgentDescriptor};

/// A registered agent with its compiled keyword matcher
pub struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    matcher: KeywordMatcher,
}

impl RegisteredAgent {
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        self.agent.descriptor()
    }

    /// Number of keywords, aliases and capability labels found in the input
    pub fn keyword_hits(&self, input: &str) -> usize {
        self.matcher.count(input)
    }

    /// Keyword score: hits plus the descriptor's base score
    pub fn score(&self, input: &str) -> f32 {
        self.keyword_hits(input) as f32 + self.descriptor().base_score
    }
}

/// Registry that holds all routable agents
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Create a new empty agent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent
    pub fn register<A: Agent + 'static>(&mut self, agent: A) -> SwitchboardResult<()> {
        self.register_arc(Arc::new(agent))
    }

    /// Register an already shared agent
    pub fn register_arc(&mut self, agent: Arc<dyn Agent>) -> SwitchboardResult<()> {
        let descriptor = agent.descriptor();
        let name = descriptor.name.clone();

        if self.index.contains_key(&name) {
            return Err(SwitchboardError::DuplicateAgent(name));
        }

        let matcher = KeywordMatcher::new(descriptor.match_terms()).map_err(|e| {
            SwitchboardError::InvalidConfig(format!("Bad keywords for agent '{}': {}", name, e))
        })?;

        tracing::info!(
            "[AgentRegistry] Registering agent '{}' (type: {}, capabilities: {:?})",
            name,
            descriptor.agent_type,
            descriptor.capabilities
        );

        self.index.insert(name, self.agents.len());
        self.agents.push(RegisteredAgent { agent, matcher });
        Ok(())
    }

    /// Get an agent by name
    pub fn get(&self, name: &str) -> SwitchboardResult<Arc<dyn Agent>> {
        self.entry(name)
            .map(|e| e.agent.clone())
            .ok_or_else(|| SwitchboardError::AgentNotFound(name.to_string()))
    }

    /// Get a registered entry by name
    pub fn entry(&self, name: &str) -> Option<&RegisteredAgent> {
        self.index.get(name).map(|&i| &self.agents[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors in registration order
    pub fn list(&self) -> Vec<&AgentDescriptor> {
        self.agents.iter().map(|e| e.descriptor()).collect()
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.agents.iter()
    }

    /// First registered entry (the fallback target)
    pub fn first(&self) -> Option<&RegisteredAgent> {
        self.agents.first()
    }

    /// Find an agent by exact name, then by type, then by case-insensitive
    /// substring of its name
    pub fn resolve(&self, name_or_type: &str) -> Option<&RegisteredAgent> {
        let wanted = name_or_type.trim();
        if wanted.is_empty() {
            return None;
        }

        if let Some(entry) = self.entry(wanted) {
            return Some(entry);
        }

        if let Some(entry) = self
            .agents
            .iter()
            .find(|e| e.descriptor().agent_type.eq_ignore_ascii_case(wanted))
        {
            return Some(entry);
        }

        let needle = wanted.to_lowercase();
        self.agents
            .iter()
            .find(|e| e.descriptor().name.to_lowercase().contains(&needle))
    }

    /// Get the list of agent names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|e| e.descriptor().name.as_str()).collect()
    }

    /// Get the number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::core::Capability;

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("AnalyticalAgent", "analytical")
                    .with_capability(Capability::Analytical)
                    .with_keywords(["analyze", "data"]),
                "numbers",
            ))
            .unwrap();
        registry
            .register(ScriptedAgent::new(
                AgentDescriptor::new("CreativeAgent", "creative")
                    .with_capability(Capability::Creative)
                    .with_aliases(["writer"]),
                "words",
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_empty_registry() {
        let registry = AgentRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.first().is_none());
        assert!(matches!(
            registry.get("nonexistent"),
            Err(SwitchboardError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        let err = registry
            .register(ScriptedAgent::new(AgentDescriptor::new("CreativeAgent", "other"), "dup"))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::DuplicateAgent(name) if name == "CreativeAgent"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registration_order() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["AnalyticalAgent", "CreativeAgent"]);
        assert_eq!(registry.first().unwrap().descriptor().name, "AnalyticalAgent");
        assert_eq!(registry.list()[1].agent_type, "creative");
    }

    #[test]
    fn test_resolve_order() {
        let registry = registry();

        let by_name = registry.resolve("CreativeAgent").unwrap();
        assert_eq!(by_name.descriptor().name, "CreativeAgent");

        let by_type = registry.resolve("Analytical").unwrap();
        assert_eq!(by_type.descriptor().name, "AnalyticalAgent");

        let by_substring = registry.resolve("creat").unwrap();
        assert_eq!(by_substring.descriptor().name, "CreativeAgent");

        assert!(registry.resolve("BillingAgent").is_none());
        assert!(registry.resolve("  ").is_none());
    }

    #[test]
    fn test_scoring() {
        let registry = registry();
        let analytical = registry.entry("AnalyticalAgent").unwrap();
        assert_eq!(analytical.keyword_hits("Please analyze the data"), 2);

        let creative = registry.entry("CreativeAgent").unwrap();
        assert_eq!(creative.score("be a creative writer"), 2.0);
    }
}
