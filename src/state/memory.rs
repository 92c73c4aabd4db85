//! Cross-session memory
//!
//! A user's recent opted-in sessions are condensed into a bounded snapshot
//! stored as a user-scoped shared entry. Agent turns only ever see other
//! sessions through that snapshot; the search helpers read raw histories and
//! are meant for the user themself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{SwitchboardError, SwitchboardResult};

use super::manager::{StateContext, StateManager};
use super::permissions::{PermissionSpec, StateScope};
use super::session::{MessageEntry, PreferencesUpdate, Role, SessionState};
use super::shared::{cross_session_memory_key, SharedStateEntry};

/// One session as seen from another session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_agent: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Most recent messages, oldest first
    pub messages: Vec<MessageEntry>,
}

/// Size-bounded view of a user's most recent sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSessionMemory {
    pub user_id: String,
    /// Newest session first
    pub sessions: Vec<SessionSummary>,
    pub generated_at: DateTime<Utc>,
}

impl CrossSessionMemory {
    /// Build a snapshot from sessions sorted newest first
    pub fn build(
        user_id: impl Into<String>,
        sessions: &[SessionState],
        max_sessions: usize,
        max_messages: usize,
    ) -> Self {
        let sessions = sessions
            .iter()
            .take(max_sessions)
            .map(|s| SessionSummary {
                session_id: s.session_id.clone(),
                last_agent: s.last_agent().map(str::to_string),
                updated_at: s.metadata.updated_at,
                messages: s.recent_messages(max_messages).to_vec(),
            })
            .collect();

        Self {
            user_id: user_id.into(),
            sessions,
            generated_at: Utc::now(),
        }
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionSummary> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub fn message_count(&self) -> usize {
        self.sessions.iter().map(|s| s.messages.len()).sum()
    }

    /// Context messages from other sessions that share terms with `query`
    ///
    /// Best matches first, newest first among equals.
    pub fn related(&self, query: &str, exclude_session: &str, limit: usize) -> Vec<MessageEntry> {
        let query_terms = terms(query);
        let mut scored: Vec<(f32, &MessageEntry)> = self
            .sessions
            .iter()
            .filter(|s| s.session_id != exclude_session)
            .flat_map(|s| s.messages.iter())
            .filter_map(|m| {
                let score = overlap(&query_terms, &m.content);
                (score > 0.0).then_some((score, m))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.timestamp.cmp(&a.1.timestamp)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, m)| context_message(&m.content))
            .collect()
    }
}

fn context_message(content: &str) -> MessageEntry {
    MessageEntry::system(format!("[Relevant Context: {}]", content))
}

/// Parameters for a memory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryQuery {
    pub user_id: String,
    /// Restrict the search to one session
    pub session_id: Option<String>,
    /// Maximum hits (None = configured default)
    pub limit: Option<usize>,
}

impl MemoryQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            limit: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A message matching a memory search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHit {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    /// Fraction of query terms present in the message
    pub score: f32,
    pub timestamp: DateTime<Utc>,
}

fn terms(text: &str) -> Vec<String> {
    let mut out: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    out.sort();
    out.dedup();
    out
}

fn overlap(query_terms: &[String], content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = terms(content);
    let matched = query_terms
        .iter()
        .filter(|t| content_terms.binary_search(t).is_ok())
        .count();
    matched as f32 / query_terms.len() as f32
}

impl StateManager {
    fn check_user(user_id: &str, ctx: &StateContext, action: &str) -> SwitchboardResult<()> {
        if ctx.is_system() || ctx.principal == user_id {
            Ok(())
        } else {
            Err(SwitchboardError::permission_denied(
                &ctx.principal,
                action,
                format!("user:{}", user_id),
            ))
        }
    }

    /// Opt a session into sharing and rebuild its owner's snapshot
    ///
    /// The snapshot holds the owner's most recent sessions that have
    /// `cross_session_memory` on. It is always written as an owner-only
    /// entry, whatever was stored under the key before.
    pub async fn share_session_memory(
        &self,
        session_id: &str,
        ctx: &StateContext,
    ) -> SwitchboardResult<CrossSessionMemory> {
        let state = self.get_session_state(session_id, ctx).await?;
        let user_id = state.user_id().map(str::to_string).ok_or_else(|| {
            SwitchboardError::other(format!("Session {} has no owning user", session_id))
        })?;

        if !state.user_preferences.cross_session_memory {
            self.update_preferences(session_id, PreferencesUpdate::cross_session_memory(true), ctx)
                .await?;
            tracing::debug!(session_id, "Session opted into sharing");
        }

        let limits = self.memory_config();
        let sessions: Vec<SessionState> = self
            .user_sessions(&user_id)
            .await?
            .into_iter()
            .filter(|s| s.user_preferences.cross_session_memory)
            .collect();
        let snapshot = CrossSessionMemory::build(
            &user_id,
            &sessions,
            limits.max_sessions,
            limits.max_messages_per_session,
        );

        let key = cross_session_memory_key(&user_id);
        let data = serde_json::to_value(&snapshot)?;
        self.replace_shared(&key, |current| {
            let mut entry = SharedStateEntry::new(
                &key,
                data,
                StateScope::User,
                PermissionSpec::owner_only(&user_id),
                &user_id,
            );
            if let Some(current) = current {
                if current.owner != user_id {
                    tracing::warn!(key = %key, owner = %current.owner, "Reclaiming snapshot key");
                }
                entry.created_at = current.created_at;
            }
            Ok(Some(entry))
        })
        .await?;

        tracing::info!(
            session_id,
            user_id,
            sessions = snapshot.sessions.len(),
            "Shared session memory"
        );
        Ok(snapshot)
    }

    /// Strip a deleted session from its owner's snapshot
    pub(super) async fn forget_shared_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> SwitchboardResult<()> {
        let key = cross_session_memory_key(user_id);
        let replaced = self
            .replace_shared(&key, |current| {
                let Some(mut entry) = current else {
                    return Ok(None);
                };
                let mut snapshot: CrossSessionMemory = serde_json::from_value(entry.data.clone())?;
                if snapshot.session(session_id).is_none() {
                    return Ok(None);
                }
                snapshot.sessions.retain(|s| s.session_id != session_id);
                entry.data = serde_json::to_value(&snapshot)?;
                entry.updated_at = Utc::now();
                Ok(Some(entry))
            })
            .await?;

        if replaced.is_some() {
            tracing::info!(user_id, session_id, "Removed deleted session from shared memory");
        }
        Ok(())
    }

    /// Read a user's cross-session snapshot
    pub async fn load_cross_session_memory(
        &self,
        user_id: &str,
        ctx: &StateContext,
    ) -> SwitchboardResult<CrossSessionMemory> {
        let entry = self
            .get_shared_state(&cross_session_memory_key(user_id), ctx)
            .await?;
        Ok(serde_json::from_value(entry.data)?)
    }

    /// Context for an agent turn drawn from the user's shared snapshot
    ///
    /// Only sessions the user shared are visible, and the asking session is
    /// skipped. No snapshot yet means no context.
    pub async fn shared_context(
        &self,
        query: &str,
        session_id: &str,
        user_id: &str,
        max_messages: Option<usize>,
        ctx: &StateContext,
    ) -> SwitchboardResult<Vec<MessageEntry>> {
        let snapshot = match self.load_cross_session_memory(user_id, ctx).await {
            Ok(snapshot) => snapshot,
            Err(SwitchboardError::SharedStateNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let limit = max_messages.unwrap_or(self.memory_config().context_messages);
        Ok(snapshot.related(query, session_id, limit))
    }

    /// Token-overlap search over one user's message histories
    ///
    /// Hits are ordered by score, then newest first.
    pub async fn search_memories(
        &self,
        query: &str,
        params: &MemoryQuery,
        ctx: &StateContext,
    ) -> SwitchboardResult<Vec<MemoryHit>> {
        Self::check_user(&params.user_id, ctx, "search")?;

        let sessions = match &params.session_id {
            Some(session_id) => {
                let state = self
                    .get_session_state(session_id, &StateContext::system())
                    .await?;
                if state.user_id() != Some(params.user_id.as_str()) {
                    return Err(SwitchboardError::permission_denied(
                        &ctx.principal,
                        "search",
                        session_id,
                    ));
                }
                vec![state]
            }
            None => self.user_sessions(&params.user_id).await?,
        };

        let query_terms = terms(query);
        let mut hits: Vec<MemoryHit> = sessions
            .iter()
            .flat_map(|s| {
                s.message_history.iter().map(move |m| (s.session_id.as_str(), m))
            })
            .filter_map(|(session_id, m)| {
                let score = overlap(&query_terms, &m.content);
                (score > 0.0).then(|| MemoryHit {
                    session_id: session_id.to_string(),
                    role: m.role,
                    content: m.content.clone(),
                    score,
                    timestamp: m.timestamp,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        hits.truncate(params.limit.unwrap_or(self.memory_config().search_limit));

        tracing::debug!(user_id = %params.user_id, hits = hits.len(), "Memory search");
        Ok(hits)
    }

    /// All messages of one session
    pub async fn session_memories(
        &self,
        session_id: &str,
        ctx: &StateContext,
    ) -> SwitchboardResult<Vec<MessageEntry>> {
        Ok(self.get_session_state(session_id, ctx).await?.message_history)
    }

    /// All messages across a user's sessions, newest first
    pub async fn user_memories(
        &self,
        user_id: &str,
        limit: Option<usize>,
        ctx: &StateContext,
    ) -> SwitchboardResult<Vec<MessageEntry>> {
        Self::check_user(user_id, ctx, "list")?;

        let mut messages: Vec<MessageEntry> = self
            .user_sessions(user_id)
            .await?
            .into_iter()
            .flat_map(|s| s.message_history)
            .collect();

        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit.unwrap_or(self.memory_config().user_memory_limit));
        Ok(messages)
    }

    /// Turn search hits into system messages for an agent's context
    pub async fn context_for_query(
        &self,
        query: &str,
        session_id: Option<&str>,
        user_id: &str,
        max_messages: Option<usize>,
        ctx: &StateContext,
    ) -> SwitchboardResult<Vec<MessageEntry>> {
        let mut params = MemoryQuery::for_user(user_id)
            .with_limit(max_messages.unwrap_or(self.memory_config().context_messages));
        if let Some(session_id) = session_id {
            params = params.in_session(session_id);
        }

        let hits = self.search_memories(query, &params, ctx).await?;
        Ok(hits
            .into_iter()
            .map(|hit| context_message(&hit.content))
            .collect())
    }
}
