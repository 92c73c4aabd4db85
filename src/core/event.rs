//! Stream events relayed to the caller for a single request

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing and timing summary carried by the terminal `done` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneSummary {
    /// Name of the agent that answered
    pub agent_name: String,
    /// Type of the agent that answered
    pub agent_type: String,
    /// Routing confidence in [0, 1]
    pub confidence: f32,
    /// Whether routing deviated from the caller's primary intent
    pub fallback_used: bool,
    /// Human-readable routing reason
    pub reason: String,
    /// Wall-clock time spent inside the agent
    pub execution_time_ms: u64,
    /// Wall-clock time for the whole request
    pub total_time_ms: u64,
    /// Time until the first token reached the relay (if any token was produced)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<u64>,
}

/// Events streamed FROM the switchboard for one request
///
/// Every stream starts with `Connected` and ends with exactly one of
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Request accepted
    Connected {
        /// Session the request belongs to
        session_id: String,
    },

    /// Incremental text output
    Token {
        /// Text fragment
        content: String,
    },

    /// Status update (routing notices, progress indicators)
    Status {
        /// Status text
        message: String,
    },

    // --- Tool Execution ---
    /// Tool execution starting
    ToolStart {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        parameters: Value,
    },

    /// Incremental tool output
    ToolProgress {
        /// Tool use ID
        id: String,
        /// Progress output
        output: String,
    },

    /// Tool execution completed
    ToolResult {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool output
        result: Value,
    },

    /// Tool execution failed
    ToolError {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Failure description
        error: String,
    },

    // --- Completion ---
    /// Request completed
    Done(DoneSummary),

    /// Request failed
    Error {
        /// Failure description
        message: String,
    },
}

impl StreamEvent {
    /// Create a token event
    pub fn token(content: impl Into<String>) -> Self {
        StreamEvent::Token {
            content: content.into(),
        }
    }

    /// Create a status event
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error { .. })
    }

    /// Check if this is a tool-related event
    pub fn is_tool(&self) -> bool {
        matches!(
            self,
            StreamEvent::ToolStart { .. }
                | StreamEvent::ToolProgress { .. }
                | StreamEvent::ToolResult { .. }
                | StreamEvent::ToolError { .. }
        )
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Status { .. } => "status",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolProgress { .. } => "tool_progress",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::ToolError { .. } => "tool_error",
            StreamEvent::Done(_) => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}
