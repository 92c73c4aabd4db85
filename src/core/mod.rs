//! Core types shared across the switchboard
//!
//! - `AgentContext` - Session view handed to an agent
//! - `Task` / `Capability` - Unit of work and routing labels
//! - `StreamEvent` - Outbound event protocol
//! - `SwitchboardError` - Error types

pub mod context;
pub mod error;
pub mod event;
pub mod task;

pub use context::AgentContext;
pub use error::{SwitchboardError, SwitchboardResult};
pub use event::{DoneSummary, StreamEvent};
pub use task::{Capability, Task, TaskPriority};
