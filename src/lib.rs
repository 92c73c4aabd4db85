pub mod core;
pub mod config;
pub mod logging;

// Sessions, shared state, deferred persistence
pub mod state;

// Agents and how one is chosen
pub mod agent;
pub mod routing;
pub mod orchestrator;

// Adapters for whole-response backends
pub mod backend;

// Request handling and event plumbing
pub mod runtime;
pub mod handler;
pub mod switchboard;

// Optional components
pub mod cli;

pub use crate::agent::{Agent, AgentDescriptor, AgentRegistry, AgentResponse};
pub use crate::config::SwitchboardConfig;
pub use crate::core::{
    AgentContext, Capability, DoneSummary, StreamEvent, SwitchboardError, SwitchboardResult, Task,
};
pub use crate::handler::{EventStream, InboundRequest, StreamingSessionHandler};
pub use crate::orchestrator::{DelegationResult, Orchestrator};
pub use crate::routing::{ForcedRoute, SelectionContext, SelectionResult};
pub use crate::runtime::EventSink;
pub use crate::state::{StateContext, StateManager};
pub use crate::switchboard::Switchboard;
