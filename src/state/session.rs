//! Session state: message history, agent history, tool usage and preferences

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One message in a session's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Entry ID, used to make appends idempotent
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One completed delegation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHistoryEntry {
    pub id: String,
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    /// Agent that answered the previous turn, when it differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_from: Option<String>,
}

/// Input to `StateManager::record_agent_interaction`
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInteraction {
    pub agent_name: String,
    pub confidence: f32,
    pub handoff_from: Option<String>,
}

impl AgentInteraction {
    pub fn new(agent_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            agent_name: agent_name.into(),
            confidence,
            handoff_from: None,
        }
    }

    pub fn with_handoff_from(mut self, previous: impl Into<String>) -> Self {
        self.handoff_from = Some(previous.into());
        self
    }

    /// Turn into a history entry with a fresh ID
    pub fn into_entry(self) -> AgentHistoryEntry {
        AgentHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            agent_name: self.agent_name,
            timestamp: Utc::now(),
            confidence: self.confidence,
            handoff_from: self.handoff_from,
        }
    }
}

/// One tool invocation made while answering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageEntry {
    pub id: String,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub result: Value,
    pub success: bool,
}

impl ToolUsageEntry {
    pub fn new(tool_name: impl Into<String>, parameters: Value, result: Value, success: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
            parameters,
            result,
            success,
        }
    }
}

/// Per-session user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Share this session into the user's cross-session memory
    #[serde(default)]
    pub cross_session_memory: bool,
    /// Keep answering with the same agent across turns
    #[serde(default)]
    pub agent_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_agent: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            cross_session_memory: false,
            agent_lock: false,
            preferred_agent: None,
            last_updated: Utc::now(),
        }
    }
}

/// Partial preference update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesUpdate {
    pub cross_session_memory: Option<bool>,
    pub agent_lock: Option<bool>,
    /// `Some(None)` clears the preferred agent
    pub preferred_agent: Option<Option<String>>,
}

impl PreferencesUpdate {
    pub fn agent_lock(enabled: bool) -> Self {
        Self {
            agent_lock: Some(enabled),
            ..Self::default()
        }
    }

    pub fn cross_session_memory(enabled: bool) -> Self {
        Self {
            cross_session_memory: Some(enabled),
            ..Self::default()
        }
    }

    pub fn with_preferred_agent(mut self, agent: Option<String>) -> Self {
        self.preferred_agent = Some(agent);
        self
    }

    fn apply(self, prefs: &mut UserPreferences) {
        if let Some(value) = self.cross_session_memory {
            prefs.cross_session_memory = value;
        }
        if let Some(value) = self.agent_lock {
            prefs.agent_lock = value;
        }
        if let Some(value) = self.preferred_agent {
            prefs.preferred_agent = value;
        }
        prefs.last_updated = Utc::now();
    }
}

/// Session bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Name of the agent that answered last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Owner of the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Complete state of one conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    #[serde(default)]
    pub message_history: Vec<MessageEntry>,
    #[serde(default)]
    pub agent_history: Vec<AgentHistoryEntry>,
    #[serde(default)]
    pub tools_used: Vec<ToolUsageEntry>,
    #[serde(default)]
    pub user_preferences: UserPreferences,
    pub metadata: SessionMetadata,
}

impl SessionState {
    /// Create an empty session
    pub fn new(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            message_history: Vec::new(),
            agent_history: Vec::new(),
            tools_used: Vec::new(),
            user_preferences: UserPreferences::default(),
            metadata: SessionMetadata {
                agent: None,
                user_id,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Owner of the session, if known
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.user_id.as_deref()
    }

    /// Name of the most recent agent in the history
    pub fn last_agent(&self) -> Option<&str> {
        self.agent_history.last().map(|e| e.agent_name.as_str())
    }

    /// The most recent `limit` agent history entries, oldest first
    pub fn recent_agents(&self, limit: usize) -> &[AgentHistoryEntry] {
        let start = self.agent_history.len().saturating_sub(limit);
        &self.agent_history[start..]
    }

    /// The most recent `limit` messages, oldest first
    pub fn recent_messages(&self, limit: usize) -> &[MessageEntry] {
        let start = self.message_history.len().saturating_sub(limit);
        &self.message_history[start..]
    }

    /// Apply a partial update as one merge step
    ///
    /// Appends skip entries whose ID is already present, so replaying the
    /// same update is a no-op.
    pub fn apply(&mut self, update: SessionUpdate) {
        for message in update.append_messages {
            if !self.message_history.iter().any(|m| m.id == message.id) {
                self.message_history.push(message);
            }
        }

        for entry in update.append_agent_history {
            if !self.agent_history.iter().any(|e| e.id == entry.id) {
                self.metadata.agent = Some(entry.agent_name.clone());
                self.agent_history.push(entry);
            }
        }

        for entry in update.append_tools_used {
            if !self.tools_used.iter().any(|e| e.id == entry.id) {
                self.tools_used.push(entry);
            }
        }

        if let Some(prefs) = update.preferences {
            prefs.apply(&mut self.user_preferences);
        }

        if let Some(agent) = update.last_agent {
            self.metadata.agent = Some(agent);
        }

        if let Some(user_id) = update.user_id {
            self.metadata.user_id = Some(user_id);
        }

        self.metadata.updated_at = Utc::now();
    }
}

/// Partial update to a session
///
/// Arrays only grow through the explicit append lists; scalar fields are
/// last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub append_messages: Vec<MessageEntry>,
    pub append_agent_history: Vec<AgentHistoryEntry>,
    pub append_tools_used: Vec<ToolUsageEntry>,
    pub preferences: Option<PreferencesUpdate>,
    pub last_agent: Option<String>,
    pub user_id: Option<String>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_message(mut self, message: MessageEntry) -> Self {
        self.append_messages.push(message);
        self
    }

    pub fn append_agent(mut self, entry: AgentHistoryEntry) -> Self {
        self.append_agent_history.push(entry);
        self
    }

    pub fn append_tool(mut self, entry: ToolUsageEntry) -> Self {
        self.append_tools_used.push(entry);
        self
    }

    pub fn with_preferences(mut self, prefs: PreferencesUpdate) -> Self {
        self.preferences = Some(prefs);
        self
    }

    pub fn with_last_agent(mut self, agent: impl Into<String>) -> Self {
        self.last_agent = Some(agent.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Check if the update changes nothing but `updated_at`
    pub fn is_empty(&self) -> bool {
        self.append_messages.is_empty()
            && self.append_agent_history.is_empty()
            && self.append_tools_used.is_empty()
            && self.preferences.is_none()
            && self.last_agent.is_none()
            && self.user_id.is_none()
    }
}
