//! Shared state entries: the only channel between sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::permissions::{PermissionSpec, StateScope};

/// A permissioned key-value record visible across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedStateEntry {
    pub key: String,
    pub data: Value,
    pub scope: StateScope,
    pub permissions: PermissionSpec,
    /// Principal that created the entry
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedStateEntry {
    pub fn new(
        key: impl Into<String>,
        data: Value,
        scope: StateScope,
        permissions: PermissionSpec,
        owner: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            data,
            scope,
            permissions,
            owner: owner.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Key of a user's cross-session memory snapshot
pub fn cross_session_memory_key(user_id: &str) -> String {
    format!("user:{}:cross-session-memory", user_id)
}
