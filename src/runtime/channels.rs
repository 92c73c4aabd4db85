//! Event channel between a running agent and the request relay
//!
//! Agents write `StreamEvent`s into an `EventSink`; the relay drains the
//! matching receiver in production order. The channel is unbounded so a slow
//! consumer never stalls an agent, and sends after the receiver is gone are
//! silently dropped: the agent keeps running to completion.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::StreamEvent;

/// Sender half of the event channel (used by agents)
pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

/// Receiver half of the event channel (used by the relay)
pub type EventReceiver = mpsc::UnboundedReceiver<StreamEvent>;

/// Create a new event channel pair
pub fn create_event_channel() -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink::new(tx), rx)
}

/// Where an agent sends incremental output
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<EventSender>,
}

impl EventSink {
    pub fn new(tx: EventSender) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Send an event; returns false if nobody is listening
    pub fn send(&self, event: StreamEvent) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// True once the receiver is gone (or the sink is detached)
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    // =========================================================================
    // Convenience senders
    // =========================================================================

    pub fn send_token(&self, content: impl Into<String>) -> bool {
        self.send(StreamEvent::token(content))
    }

    pub fn send_status(&self, message: impl Into<String>) -> bool {
        self.send(StreamEvent::status(message))
    }

    pub fn send_tool_start(&self, id: impl Into<String>, name: impl Into<String>, parameters: Value) -> bool {
        self.send(StreamEvent::ToolStart {
            id: id.into(),
            name: name.into(),
            parameters,
        })
    }

    pub fn send_tool_progress(&self, id: impl Into<String>, output: impl Into<String>) -> bool {
        self.send(StreamEvent::ToolProgress {
            id: id.into(),
            output: output.into(),
        })
    }

    pub fn send_tool_result(&self, id: impl Into<String>, name: impl Into<String>, result: Value) -> bool {
        self.send(StreamEvent::ToolResult {
            id: id.into(),
            name: name.into(),
            result,
        })
    }

    pub fn send_tool_error(&self, id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> bool {
        self.send(StreamEvent::ToolError {
            id: id.into(),
            name: name.into(),
            error: error.into(),
        })
    }
}
