//! Agent context - session view handed to an agent for one delegation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::state::{MessageEntry, UserPreferences};

/// Read-only view of the session an agent is answering in
///
/// Built by the caller from the current session state. Agents never touch
/// the state manager directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    // --- Identity ---
    pub session_id: String,

    pub user_id: Option<String>,

    // --- Conversation ---
    /// Most recent messages, oldest first
    #[serde(default)]
    pub recent_messages: Vec<MessageEntry>,

    /// Agent that answered the previous turn
    pub previous_agent: Option<String>,

    #[serde(default)]
    pub preferences: UserPreferences,

    // --- Extensible Metadata (JSON-serializable) ---
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<MessageEntry>) -> Self {
        self.recent_messages = messages;
        self
    }

    pub fn with_previous_agent(mut self, agent: Option<String>) -> Self {
        self.previous_agent = agent;
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn get_metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builders() {
        let mut ctx = AgentContext::new("s1")
            .with_user_id("alice")
            .with_messages(vec![MessageEntry::user("hi")])
            .with_previous_agent(Some("CreativeAgent".into()));

        ctx.set_metadata("channel", "web");

        assert_eq!(ctx.session_id, "s1");
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert_eq!(ctx.recent_messages.len(), 1);
        assert_eq!(ctx.previous_agent.as_deref(), Some("CreativeAgent"));
        assert_eq!(ctx.get_metadata_str("channel"), Some("web"));
        assert!(ctx.get_metadata("missing").is_none());
    }

    #[test]
    fn test_context_serialization() {
        let ctx = AgentContext::new("s1").with_user_id("bob");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: AgentContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, "s1");
        assert_eq!(back.user_id.as_deref(), Some("bob"));
    }
}
