//! Tasks handed to agents and the capability vocabulary used for routing

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of work an agent can take on
///
/// `General` marks an agent that accepts every task type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Analytical,
    Creative,
    Technical,
    Research,
    Conversational,
    General,
    Custom(String),
}

impl Capability {
    /// Parse a free-text task type, falling back to `Custom`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "analytical" | "analysis" | "analytics" => Capability::Analytical,
            "creative" | "writing" => Capability::Creative,
            "technical" | "code" | "coding" => Capability::Technical,
            "research" => Capability::Research,
            "conversational" | "chat" => Capability::Conversational,
            "general" | "" => Capability::General,
            other => Capability::Custom(other.to_string()),
        }
    }

    /// Lowercase label used for keyword matching
    pub fn label(&self) -> &str {
        match self {
            Capability::Analytical => "analytical",
            Capability::Creative => "creative",
            Capability::Technical => "technical",
            Capability::Research => "research",
            Capability::Conversational => "conversational",
            Capability::General => "general",
            Capability::Custom(name) => name,
        }
    }
}

impl Default for Capability {
    fn default() -> Self {
        Capability::General
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Priority of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A unit of work delegated to one agent
///
/// Created per request and consumed once; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: String,
    /// Kind of work requested
    pub task_type: Capability,
    /// User input
    pub input: String,
    /// Free-form parameters for the agent
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Scheduling priority
    #[serde(default)]
    pub priority: TaskPriority,
}

impl Task {
    /// Create a new general task with a fresh ID
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: Capability::General,
            input: input.into(),
            parameters: HashMap::new(),
            priority: TaskPriority::Normal,
        }
    }

    /// Set the task type
    pub fn with_type(mut self, task_type: Capability) -> Self {
        self.task_type = task_type;
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parse() {
        assert_eq!(Capability::parse("Analysis"), Capability::Analytical);
        assert_eq!(Capability::parse(" chat "), Capability::Conversational);
        assert_eq!(Capability::parse(""), Capability::General);
        assert_eq!(
            Capability::parse("billing"),
            Capability::Custom("billing".into())
        );
        assert_eq!(Capability::Custom("billing".into()).label(), "billing");
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("summarize")
            .with_type(Capability::Research)
            .with_parameter("depth", serde_json::json!(2))
            .with_priority(TaskPriority::High);

        assert_eq!(task.task_type, Capability::Research);
        assert_eq!(task.parameters["depth"], 2);
        assert!(task.priority > TaskPriority::Normal);
        assert!(!task.id.is_empty());
    }
}
