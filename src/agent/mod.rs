//! Agents and the agent registry
//!
//! - `Agent` - Trait every routable agent implements
//! - `AgentDescriptor` - Name, type, capabilities and keywords used for routing
//! - `AgentRegistry` - Registered agents in registration order
//! - `ScriptedAgent` - Canned-reply agent for demos and tests

#[allow(clippy::module_inception)]
pub mod agent;
pub mod registry;
pub mod scripted;

pub use agent::{Agent, AgentDescriptor, AgentResponse};
pub use registry::{AgentRegistry, RegisteredAgent};
pub use scripted::{ScriptedAgent, ScriptedTool};
