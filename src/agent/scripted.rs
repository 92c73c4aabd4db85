//! ScriptedAgent - canned replies for demos and tests

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AgentContext, Task};
use crate::runtime::EventSink;

use super::agent::{Agent, AgentDescriptor, AgentResponse};

/// A tool call the agent pretends to make before answering
#[derive(Debug, Clone)]
pub struct ScriptedTool {
    pub name: String,
    pub parameters: Value,
    /// `Err` produces a `tool_error` event
    pub outcome: std::result::Result<Value, String>,
}

impl ScriptedTool {
    pub fn ok(name: impl Into<String>, parameters: Value, result: Value) -> Self {
        Self {
            name: name.into(),
            parameters,
            outcome: Ok(result),
        }
    }

    pub fn failing(name: impl Into<String>, parameters: Value, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters,
            outcome: Err(error.into()),
        }
    }
}

/// Agent that streams a fixed reply word by word
///
/// `{input}` in the reply is replaced with the task input.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    descriptor: AgentDescriptor,
    reply: String,
    tools: Vec<ScriptedTool>,
    token_delay: Duration,
    failure: Option<String>,
}

impl ScriptedAgent {
    pub fn new(descriptor: AgentDescriptor, reply: impl Into<String>) -> Self {
        Self {
            descriptor,
            reply: reply.into(),
            tools: Vec::new(),
            token_delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_tool(mut self, tool: ScriptedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Pause between streamed words
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Fail after streaming the reply
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process_message(
        &self,
        task: Task,
        _context: AgentContext,
        sink: EventSink,
    ) -> Result<AgentResponse> {
        for tool in &self.tools {
            let id = uuid::Uuid::new_v4().to_string();
            sink.send_tool_start(&id, &tool.name, tool.parameters.clone());
            match &tool.outcome {
                Ok(result) => sink.send_tool_result(&id, &tool.name, result.clone()),
                Err(error) => sink.send_tool_error(&id, &tool.name, error),
            };
        }

        let reply = self.reply.replace("{input}", &task.input);
        for word in reply.split_inclusive(' ') {
            if !self.token_delay.is_zero() {
                tokio::time::sleep(self.token_delay).await;
            }
            sink.send_token(word);
        }

        if let Some(message) = &self.failure {
            bail!("{}", message);
        }

        Ok(AgentResponse::new(reply).with_metadata("task_id", task.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamEvent;
    use crate::runtime::create_event_channel;

    #[tokio::test]
    async fn test_streams_reply() {
        let agent = ScriptedAgent::new(AgentDescriptor::new("Echo", "echo"), "You said {input}");
        let (sink, mut rx) = create_event_channel();

        let response = agent
            .process_message(Task::new("hi there"), AgentContext::new("s1"), sink)
            .await
            .unwrap();

        assert_eq!(response.message, "You said hi there");

        let mut streamed = String::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::Token { content } = event {
                streamed.push_str(&content);
            }
        }
        assert_eq!(streamed, response.message);
    }

    #[tokio::test]
    async fn test_tool_events_and_failure() {
        let agent = ScriptedAgent::new(AgentDescriptor::new("Tooler", "tools"), "ok")
            .with_tool(ScriptedTool::ok("search", serde_json::json!({"q": "x"}), serde_json::json!(1)))
            .with_tool(ScriptedTool::failing("fetch", Value::Null, "timeout"))
            .failing_with("backend down");
        let (sink, mut rx) = create_event_channel();

        let err = agent
            .process_message(Task::new("go"), AgentContext::new("s1"), sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "backend down");

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["tool_start", "tool_result", "tool_start", "tool_error", "token"]);
    }
}
