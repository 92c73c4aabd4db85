//! Scoped permissions for shared state entries
//!
//! Every shared entry carries three principal lists:
//! - **read**: may fetch the entry
//! - **write**: may replace its data
//! - **delete**: may remove it (and change its permissions)
//!
//! The principal `*` matches everyone.

use serde::{Deserialize, Serialize};

/// Principal that matches any caller
pub const ANY_PRINCIPAL: &str = "*";

/// Visibility scope of a shared entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateScope {
    /// Visible to the owning session's principal only
    Session,
    /// Visible to every session of one user
    User,
    /// Readable by everyone
    Global,
}

/// Kind of access being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Delete,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Delete => "delete",
        }
    }
}

/// Result of checking permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Allowed,
    Denied,
}

impl CheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CheckResult::Allowed)
    }
}

/// Principal lists for one shared entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    #[serde(default)]
    pub delete: Vec<String>,
}

impl PermissionSpec {
    /// Create an empty spec (nobody has access)
    pub fn new() -> Self {
        Self::default()
    }

    /// Default permissions for a new entry created by `owner` at `scope`
    ///
    /// Session and user scopes are private to the owner; global entries are
    /// world-readable but only the owner may change them.
    pub fn for_scope(scope: StateScope, owner: &str) -> Self {
        match scope {
            StateScope::Session | StateScope::User => Self::owner_only(owner),
            StateScope::Global => Self {
                read: vec![ANY_PRINCIPAL.to_string()],
                write: vec![owner.to_string()],
                delete: vec![owner.to_string()],
            },
        }
    }

    /// Full access for one principal
    pub fn owner_only(owner: &str) -> Self {
        Self {
            read: vec![owner.to_string()],
            write: vec![owner.to_string()],
            delete: vec![owner.to_string()],
        }
    }

    /// Grant read access to a principal
    pub fn allow_read(mut self, principal: impl Into<String>) -> Self {
        push_unique(&mut self.read, principal.into());
        self
    }

    /// Grant write access to a principal
    pub fn allow_write(mut self, principal: impl Into<String>) -> Self {
        push_unique(&mut self.write, principal.into());
        self
    }

    /// Grant delete access to a principal
    pub fn allow_delete(mut self, principal: impl Into<String>) -> Self {
        push_unique(&mut self.delete, principal.into());
        self
    }

    fn principals(&self, access: Access) -> &[String] {
        match access {
            Access::Read => &self.read,
            Access::Write => &self.write,
            Access::Delete => &self.delete,
        }
    }

    /// Check whether `principal` may perform `access`
    pub fn check(&self, principal: &str, access: Access) -> CheckResult {
        let allowed = self
            .principals(access)
            .iter()
            .any(|p| p == ANY_PRINCIPAL || p == principal);

        if allowed {
            CheckResult::Allowed
        } else {
            CheckResult::Denied
        }
    }
}

fn push_unique(list: &mut Vec<String>, principal: String) {
    if !list.contains(&principal) {
        list.push(principal);
    }
}
