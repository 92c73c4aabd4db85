//! Switchboard error types

use thiserror::Error;

/// Errors that can occur in the switchboard core
#[derive(Error, Debug)]
pub enum SwitchboardError {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Agent not found in the registry
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Shared state key not found
    #[error("Shared state not found: {0}")]
    SharedStateNotFound(String),

    /// Principal is not allowed to perform the operation
    #[error("Permission denied: {principal} may not {action} '{key}'")]
    PermissionDenied {
        /// Acting principal
        principal: String,
        /// Attempted action (read, write, delete)
        action: String,
        /// Target key or session
        key: String,
    },

    /// An agent with the same name is already registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// The agent threw or returned a failure
    #[error("Delegation to {agent} failed: {message}")]
    DelegationFailure {
        /// Agent that failed
        agent: String,
        /// Failure description
        message: String,
    },

    /// Selection was requested with nothing to select from
    #[error("No agents registered")]
    NoAgentsRegistered,

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl SwitchboardError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        SwitchboardError::Other(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(
        principal: impl Into<String>,
        action: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        SwitchboardError::PermissionDenied {
            principal: principal.into(),
            action: action.into(),
            key: key.into(),
        }
    }

    /// Check if this is any of the not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SwitchboardError::SessionNotFound(_)
                | SwitchboardError::AgentNotFound(_)
                | SwitchboardError::SharedStateNotFound(_)
        )
    }

    /// Check if this is a permission violation
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SwitchboardError::PermissionDenied { .. })
    }
}

/// Result type alias for switchboard operations
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;
