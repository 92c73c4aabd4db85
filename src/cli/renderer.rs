//! Console Renderer - renders a request's event stream to the terminal
//!
//! The renderer only consumes `StreamEvent`s, so the same stream could be
//! forwarded to any other surface (SSE, WebSocket) instead.

use futures::StreamExt;

use crate::core::{DoneSummary, StreamEvent};
use crate::handler::EventStream;

use super::console::Console;

/// What a rendered turn produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderOutcome {
    /// Concatenated token text
    pub reply: String,
    /// Terminal `done` summary, if the turn succeeded
    pub summary: Option<DoneSummary>,
    /// Terminal error, if the turn failed
    pub error: Option<String>,
}

impl RenderOutcome {
    pub fn succeeded(&self) -> bool {
        self.summary.is_some()
    }
}

/// Renders event streams with a `Console`
///
/// # Example
///
/// ```ignore
/// let stream = switchboard.handle(request);
/// let outcome = ConsoleRenderer::new().render(stream).await;
/// ```
pub struct ConsoleRenderer {
    console: Console,

    /// Whether to show tool execution details
    show_tools: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::with_console(Console::new())
    }

    /// Create a renderer with a custom console
    pub fn with_console(console: Console) -> Self {
        Self {
            console,
            show_tools: true,
        }
    }

    /// Set whether to show tool execution details
    pub fn show_tools(mut self, show: bool) -> Self {
        self.show_tools = show;
        self
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Render one request's events until the terminal event
    pub async fn render(&self, mut stream: EventStream) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();
        let mut in_text = false;

        while let Some(event) = stream.next().await {
            // Tokens continue the current line; everything else starts a new one
            if in_text && !matches!(event, StreamEvent::Token { .. }) {
                self.console.println();
                in_text = false;
            }

            match event {
                StreamEvent::Connected { session_id } => {
                    tracing::debug!("[Renderer] Connected to session {}", session_id);
                }
                StreamEvent::Token { content } => {
                    if !in_text {
                        self.console.print_agent_prefix("Agent");
                        in_text = true;
                    }
                    self.console.print_token(&content);
                    outcome.reply.push_str(&content);
                }
                StreamEvent::Status { message } => {
                    self.console.print_system(&message);
                }
                StreamEvent::ToolStart { name, parameters, .. } => {
                    if self.show_tools {
                        self.console.print_tool_action(&name, &parameters.to_string());
                    }
                }
                StreamEvent::ToolProgress { output, .. } => {
                    if self.show_tools {
                        self.console.print_tool_result(&output, false);
                    }
                }
                StreamEvent::ToolResult { result, .. } => {
                    if self.show_tools {
                        let text = match result {
                            serde_json::Value::String(text) => text,
                            other => other.to_string(),
                        };
                        self.console.print_tool_result(&text, false);
                    }
                }
                StreamEvent::ToolError { error, .. } => {
                    if self.show_tools {
                        self.console.print_tool_result(&error, true);
                    }
                }
                StreamEvent::Done(summary) => {
                    self.console.print_done(&summary);
                    outcome.summary = Some(summary);
                    break;
                }
                StreamEvent::Error { message } => {
                    self.console.print_error(&message);
                    outcome.error = Some(message);
                    break;
                }
            }
        }

        if in_text {
            self.console.println();
        }
        if outcome.summary.is_none() && outcome.error.is_none() {
            tracing::warn!("[Renderer] Stream ended without a terminal event");
        }

        outcome
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn summary() -> DoneSummary {
        DoneSummary {
            agent_name: "TechnicalAgent".into(),
            agent_type: "technical".into(),
            confidence: 0.8,
            fallback_used: false,
            reason: "Matched 2 keywords".into(),
            execution_time_ms: 12,
            total_time_ms: 15,
            time_to_first_token_ms: Some(3),
        }
    }

    fn boxed(events: Vec<StreamEvent>) -> EventStream {
        Box::pin(stream::iter(events))
    }

    #[tokio::test]
    async fn test_render_collects_reply() {
        let events = vec![
            StreamEvent::Connected {
                session_id: "s1".into(),
            },
            StreamEvent::status("Routing"),
            StreamEvent::ToolStart {
                id: "t1".into(),
                name: "search".into(),
                parameters: json!({"q": "rust"}),
            },
            StreamEvent::ToolResult {
                id: "t1".into(),
                name: "search".into(),
                result: json!("3 hits"),
            },
            StreamEvent::token("Hello "),
            StreamEvent::token("there"),
            StreamEvent::Done(summary()),
            StreamEvent::token("ignored"),
        ];

        let outcome = ConsoleRenderer::new().render(boxed(events)).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.reply, "Hello there");
        assert_eq!(outcome.summary.unwrap().agent_name, "TechnicalAgent");
    }

    #[tokio::test]
    async fn test_render_stops_on_error() {
        let events = vec![
            StreamEvent::token("partial"),
            StreamEvent::error("Agent panicked"),
            StreamEvent::Done(summary()),
        ];

        let outcome = ConsoleRenderer::new()
            .show_tools(false)
            .render(boxed(events))
            .await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.error.as_deref(), Some("Agent panicked"));
        assert_eq!(outcome.reply, "partial");
    }

    #[tokio::test]
    async fn test_render_without_terminal_event() {
        let outcome = ConsoleRenderer::new()
            .render(boxed(vec![StreamEvent::token("cut off")]))
            .await;
        assert!(outcome.summary.is_none());
        assert!(outcome.error.is_none());
    }
}
