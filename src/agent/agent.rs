//! Agent trait and descriptor
//!
//! Every routable agent implements `Agent`. Content generation is opaque to
//! the switchboard: an agent gets a task and a context, may stream events
//! into its sink, and returns the final message.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AgentContext, Capability, Task};
use crate::runtime::EventSink;

/// Static description of an agent, used for routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique name (e.g., "AnalyticalAgent")
    pub name: String,
    /// Type label used by forced routes (e.g., "analytical")
    pub agent_type: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Task types this agent accepts; empty means any
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Words that suggest this agent should answer
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Alternative names, also matched against input
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Added to every keyword score
    #[serde(default)]
    pub base_score: f32,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_type: agent_type.into(),
            version: "1.0.0".to_string(),
            description: String::new(),
            capabilities: Vec::new(),
            keywords: BTreeSet::new(),
            aliases: BTreeSet::new(),
            base_score: 0.0,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn with_base_score(mut self, base_score: f32) -> Self {
        self.base_score = base_score;
        self
    }

    /// Whether this agent accepts the given task type
    pub fn supports(&self, task_type: &Capability) -> bool {
        *task_type == Capability::General
            || self.capabilities.is_empty()
            || self.capabilities.contains(&Capability::General)
            || self.capabilities.contains(task_type)
    }

    /// Terms matched against input: keywords, aliases and capability labels
    pub fn match_terms(&self) -> Vec<String> {
        let labels = self
            .capabilities
            .iter()
            .filter(|c| **c != Capability::General)
            .map(|c| c.label().to_string());

        self.keywords
            .iter()
            .chain(self.aliases.iter())
            .cloned()
            .chain(labels)
            .collect()
    }
}

/// Final output of one delegation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A routable agent
///
/// Implementations may stream tokens and tool events through `sink` while
/// working; the returned message is the complete answer. Sending into a
/// closed sink is harmless, so agents do not need to watch for callers
/// going away.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Routing descriptor; must not change after registration
    fn descriptor(&self) -> &AgentDescriptor;

    /// Get the name of this agent
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Handle one task
    async fn process_message(
        &self,
        task: Task,
        context: AgentContext,
        sink: EventSink,
    ) -> Result<AgentResponse>;
}
