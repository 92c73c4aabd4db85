//! Session and shared state
//!
//! This module provides:
//! - `SessionState` - Per-session history, tool log and preferences
//! - `SharedStateEntry` - Permissioned cross-session records
//! - `StateManager` - Cached, write-through access with per-session locking
//! - `StateBackend` - Pluggable durable storage (memory, JSON files)
//! - `PersistenceQueue` - Deferred writes with retries
//! - `CrossSessionMemory` - Per-user snapshot and memory search

pub mod backend;
pub mod manager;
pub mod memory;
pub mod permissions;
pub mod queue;
pub mod session;
pub mod shared;

pub use backend::{FileBackend, MemoryBackend, StateBackend};
pub use manager::{StateContext, StateManager, SYSTEM_PRINCIPAL};
pub use memory::{CrossSessionMemory, MemoryHit, MemoryQuery, SessionSummary};
pub use permissions::{Access, CheckResult, PermissionSpec, StateScope, ANY_PRINCIPAL};
pub use queue::{PersistenceJob, PersistenceQueue, QueueStats};
pub use session::{
    AgentHistoryEntry, AgentInteraction, MessageEntry, PreferencesUpdate, Role, SessionMetadata,
    SessionState, SessionUpdate, ToolUsageEntry, UserPreferences,
};
pub use shared::{cross_session_memory_key, SharedStateEntry};
