//! Selection strategy trait and the values it consumes and produces

use serde::{Deserialize, Serialize};

use crate::agent::{AgentRegistry, RegisteredAgent};
use crate::core::Capability;
use crate::state::{AgentHistoryEntry, SessionState, UserPreferences};

/// Caller-requested route that bypasses scoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedRoute {
    /// Agent type (or name) to route to; tried first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Slash-command style name; tried second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,
}

impl ForcedRoute {
    pub fn agent_type(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: Some(agent_type.into()),
            command_name: None,
        }
    }

    pub fn command(command_name: impl Into<String>) -> Self {
        Self {
            agent_type: None,
            command_name: Some(command_name.into()),
        }
    }

    /// Names to try, in order
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.agent_type
            .as_deref()
            .into_iter()
            .chain(self.command_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    /// What the caller asked for, for notices and reasons
    pub fn requested(&self) -> Option<String> {
        let names: Vec<&str> = self.candidates().collect();
        (!names.is_empty()).then(|| names.join("/"))
    }
}

/// Everything selection may look at besides the input text
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub session_id: String,
    pub user_id: Option<String>,
    /// Recent agent history, oldest first
    pub agent_history: Vec<AgentHistoryEntry>,
    pub preferences: UserPreferences,
    pub task_type: Option<Capability>,
    pub forced: Option<ForcedRoute>,
}

impl SelectionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Build from a session's current state, keeping the last `window`
    /// history entries
    pub fn from_session(state: &SessionState, window: usize) -> Self {
        Self {
            session_id: state.session_id.clone(),
            user_id: state.user_id().map(str::to_string),
            agent_history: state.recent_agents(window).to_vec(),
            preferences: state.user_preferences.clone(),
            task_type: None,
            forced: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<AgentHistoryEntry>) -> Self {
        self.agent_history = history;
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_task_type(mut self, task_type: Capability) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn with_forced(mut self, forced: ForcedRoute) -> Self {
        self.forced = Some(forced);
        self
    }

    /// Task type to check capabilities against
    pub fn effective_task_type(&self) -> Capability {
        self.task_type.clone().unwrap_or_default()
    }

    pub fn last_agent(&self) -> Option<&str> {
        self.agent_history.last().map(|e| e.agent_name.as_str())
    }
}

/// Outcome of agent selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_agent: String,
    pub agent_type: String,
    /// In [0, 1]
    pub confidence: f32,
    pub reason: String,
    /// True when selection deviated from the primary intent (no keyword
    /// match, broken agent lock, or an unresolvable forced route)
    pub fallback_used: bool,
    /// Strategy that produced the result
    pub strategy: String,
    /// Forced route the caller asked for, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_override: Option<String>,
}

impl SelectionResult {
    pub fn new(
        entry: &RegisteredAgent,
        confidence: f32,
        reason: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Self {
        let descriptor = entry.descriptor();
        Self {
            selected_agent: descriptor.name.clone(),
            agent_type: descriptor.agent_type.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            fallback_used: false,
            strategy: strategy.into(),
            requested_override: None,
        }
    }

    pub fn with_fallback(mut self, fallback_used: bool) -> Self {
        self.fallback_used = fallback_used;
        self
    }

    pub fn with_requested_override(mut self, requested: Option<String>) -> Self {
        self.requested_override = requested;
        self
    }
}

/// A way of picking an agent for an input
///
/// Strategies are pure: they read the registry and context and either
/// produce a result or decline with `None`.
pub trait SelectionStrategy: Send + Sync {
    /// Get the name of this strategy
    fn name(&self) -> &str;

    fn select(
        &self,
        input: &str,
        ctx: &SelectionContext,
        registry: &AgentRegistry,
    ) -> Option<SelectionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentInteraction;

    #[test]
    fn test_forced_route_candidates() {
        let both = ForcedRoute {
            agent_type: Some("billing".into()),
            command_name: Some("BillingAgent".into()),
        };
        assert_eq!(both.candidates().collect::<Vec<_>>(), vec!["billing", "BillingAgent"]);
        assert_eq!(both.requested().as_deref(), Some("billing/BillingAgent"));

        let blank = ForcedRoute::agent_type("  ");
        assert_eq!(blank.candidates().count(), 0);
        assert!(blank.requested().is_none());
    }

    #[test]
    fn test_context_from_session() {
        let mut state = SessionState::new("s1", Some("alice".into()));
        for i in 0..5 {
            state
                .agent_history
                .push(AgentInteraction::new(format!("a{}", i), 0.7).into_entry());
        }

        let ctx = SelectionContext::from_session(&state, 3);
        assert_eq!(ctx.session_id, "s1");
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert_eq!(ctx.agent_history.len(), 3);
        assert_eq!(ctx.last_agent(), Some("a4"));
        assert_eq!(ctx.effective_task_type(), Capability::General);
    }
}
