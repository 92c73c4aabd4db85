//! StateManager - cached, write-through access to session and shared state
//!
//! The manager is responsible for:
//! - Caching session state in memory, loading from the backend on a miss
//! - Serializing updates per session so concurrent appends are never lost
//! - Checking shared-state permissions before any change is applied
//! - Writing every change through to the backend

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::config::MemoryConfig;
use crate::core::{SwitchboardError, SwitchboardResult};

use super::backend::StateBackend;
use super::permissions::{Access, PermissionSpec, StateScope};
use super::session::{
    AgentInteraction, MessageEntry, PreferencesUpdate, Role, SessionState, SessionUpdate,
    ToolUsageEntry,
};
use super::shared::SharedStateEntry;

/// Principal used by internal writers (persistence queue, maintenance)
pub const SYSTEM_PRINCIPAL: &str = "system";

/// Shared keys starting with `user:{id}:` belong to that user
const USER_KEY_PREFIX: &str = "user:";

/// Who is acting, and whether a missing session may be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateContext {
    pub principal: String,
    pub create_if_missing: bool,
}

impl StateContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            create_if_missing: false,
        }
    }

    /// Context for internal writers
    pub fn system() -> Self {
        Self::new(SYSTEM_PRINCIPAL)
    }

    /// Allow the operation to create the session on first write
    pub fn creating(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn is_system(&self) -> bool {
        self.principal == SYSTEM_PRINCIPAL
    }
}

/// Cache slot for one session
#[derive(Debug, Default)]
struct CachedSession {
    state: Option<SessionState>,
    loaded_at: Option<Instant>,
}

impl CachedSession {
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        match (self.loaded_at, ttl) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(at), Some(ttl)) => at.elapsed() < ttl,
        }
    }
}

type SessionSlot = Arc<Mutex<CachedSession>>;

/// Owner of session and shared state
///
/// Construct one per process and share it through `Arc`.
pub struct StateManager {
    backend: Arc<dyn StateBackend>,
    sessions: RwLock<HashMap<String, SessionSlot>>,
    shared: RwLock<HashMap<String, SharedStateEntry>>,
    /// Held across check-then-act for shared state mutations
    shared_write: Mutex<()>,
    cache_ttl: Option<Duration>,
    memory: MemoryConfig,
}

impl StateManager {
    /// Create a manager over a backend with default memory bounds
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
            shared: RwLock::new(HashMap::new()),
            shared_write: Mutex::new(()),
            cache_ttl: None,
            memory: MemoryConfig::default(),
        }
    }

    /// Set how long cached sessions stay fresh
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set cross-session memory bounds
    pub fn with_memory_config(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory_config(&self) -> &MemoryConfig {
        &self.memory
    }

    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }

    // =========================================================================
    // Session cache plumbing
    // =========================================================================

    async fn slot(&self, session_id: &str) -> SessionSlot {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return slot.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CachedSession::default())))
            .clone()
    }

    /// Remove a slot nobody else holds
    ///
    /// Callers must drop their own handle first. A slot still held by an
    /// in-flight update stays, so its write cannot race a fresh slot.
    async fn prune(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        let idle = sessions
            .get(session_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if idle {
            sessions.remove(session_id);
        }
    }

    /// Give back the slot when a lookup found no session
    async fn release_missing<T>(
        &self,
        session_id: &str,
        slot: SessionSlot,
        result: SwitchboardResult<T>,
    ) -> SwitchboardResult<T> {
        if matches!(result, Err(SwitchboardError::SessionNotFound(_))) {
            drop(slot);
            self.prune(session_id).await;
        }
        result
    }

    /// Make sure the slot reflects the backend (unless it is fresh)
    async fn ensure_loaded(&self, session_id: &str, cached: &mut CachedSession) -> SwitchboardResult<()> {
        if cached.is_fresh(self.cache_ttl) {
            tracing::debug!(session_id, "Session cache hit");
            return Ok(());
        }

        tracing::debug!(session_id, backend = self.backend.name(), "Loading session");
        cached.state = self.backend.load_session(session_id).await?;
        cached.loaded_at = Some(Instant::now());
        Ok(())
    }

    fn check_session_access(state: &SessionState, ctx: &StateContext) -> SwitchboardResult<()> {
        match state.user_id() {
            Some(owner) if !ctx.is_system() && owner != ctx.principal => Err(
                SwitchboardError::permission_denied(&ctx.principal, "access", &state.session_id),
            ),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Session state
    // =========================================================================

    /// Create a session, or return it unchanged if it already exists
    pub async fn create_session(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> SwitchboardResult<SessionState> {
        let slot = self.slot(session_id).await;
        let mut cached = slot.lock().await;
        self.ensure_loaded(session_id, &mut cached).await?;

        if let Some(state) = &cached.state {
            return Ok(state.clone());
        }

        let state = SessionState::new(session_id, user_id.map(str::to_string));
        self.backend.save_session(&state).await?;
        cached.state = Some(state.clone());

        tracing::info!(session_id, user_id = ?user_id, "Created session");
        Ok(state)
    }

    /// Get a session's state
    ///
    /// With `ctx.create_if_missing`, an absent session is created for the
    /// acting principal instead of returning `SessionNotFound`.
    pub async fn get_session_state(
        &self,
        session_id: &str,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let slot = self.slot(session_id).await;
        let result = self.read_slot(session_id, &slot, ctx).await;
        self.release_missing(session_id, slot, result).await
    }

    async fn read_slot(
        &self,
        session_id: &str,
        slot: &SessionSlot,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let mut cached = slot.lock().await;
        self.ensure_loaded(session_id, &mut cached).await?;

        match &cached.state {
            Some(state) => {
                Self::check_session_access(state, ctx)?;
                Ok(state.clone())
            }
            None if ctx.create_if_missing => {
                let owner = (!ctx.is_system()).then(|| ctx.principal.clone());
                let state = SessionState::new(session_id, owner);
                self.backend.save_session(&state).await?;
                cached.state = Some(state.clone());
                tracing::info!(session_id, "Created session on first read");
                Ok(state)
            }
            None => Err(SwitchboardError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Merge a partial update into a session and write it through
    ///
    /// Updates to the same session are applied one at a time; the backend
    /// write happens before the cache is replaced, so a failed write leaves
    /// the cached state untouched.
    pub async fn update_session_state(
        &self,
        session_id: &str,
        update: SessionUpdate,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let slot = self.slot(session_id).await;
        let result = self.update_slot(session_id, &slot, update, ctx).await;
        self.release_missing(session_id, slot, result).await
    }

    async fn update_slot(
        &self,
        session_id: &str,
        slot: &SessionSlot,
        update: SessionUpdate,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let mut cached = slot.lock().await;
        self.ensure_loaded(session_id, &mut cached).await?;

        let mut next = match &cached.state {
            Some(state) => {
                Self::check_session_access(state, ctx)?;
                state.clone()
            }
            None if ctx.create_if_missing => {
                let owner = update
                    .user_id
                    .clone()
                    .or_else(|| (!ctx.is_system()).then(|| ctx.principal.clone()));
                SessionState::new(session_id, owner)
            }
            None => return Err(SwitchboardError::SessionNotFound(session_id.to_string())),
        };

        next.apply(update);
        self.backend.save_session(&next).await?;
        cached.state = Some(next.clone());
        cached.loaded_at = Some(Instant::now());
        Ok(next)
    }

    /// Append one message
    pub async fn save_message(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let update = SessionUpdate::new().append_message(MessageEntry::new(role, content));
        self.update_session_state(session_id, update, ctx).await
    }

    /// Append one completed delegation to the agent history
    pub async fn record_agent_interaction(
        &self,
        session_id: &str,
        interaction: AgentInteraction,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        tracing::debug!(
            session_id,
            agent = %interaction.agent_name,
            confidence = interaction.confidence,
            "Recording agent interaction"
        );
        let update = SessionUpdate::new().append_agent(interaction.into_entry());
        self.update_session_state(session_id, update, ctx).await
    }

    /// Append one tool invocation
    pub async fn record_tool_usage(
        &self,
        session_id: &str,
        tool_name: impl Into<String>,
        parameters: Value,
        result: Value,
        success: bool,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let entry = ToolUsageEntry::new(tool_name, parameters, result, success);
        let update = SessionUpdate::new().append_tool(entry);
        self.update_session_state(session_id, update, ctx).await
    }

    /// Change user preferences for a session
    pub async fn update_preferences(
        &self,
        session_id: &str,
        prefs: PreferencesUpdate,
        ctx: &StateContext,
    ) -> SwitchboardResult<SessionState> {
        let update = SessionUpdate::new().with_preferences(prefs);
        self.update_session_state(session_id, update, ctx).await
    }

    /// Delete a session from cache and durable storage
    ///
    /// Irreversible. The session's messages are also removed from its
    /// owner's cross-session snapshot. Deleting an absent session is not an
    /// error.
    pub async fn delete_session(&self, session_id: &str, ctx: &StateContext) -> SwitchboardResult<()> {
        let slot = self.slot(session_id).await;
        let mut cached = slot.lock().await;
        self.ensure_loaded(session_id, &mut cached).await?;

        let owner = match &cached.state {
            Some(state) => {
                Self::check_session_access(state, ctx)?;
                state.user_id().map(str::to_string)
            }
            None => None,
        };

        self.backend.delete_session(session_id).await?;
        cached.state = None;
        cached.loaded_at = None;
        drop(cached);
        drop(slot);
        self.prune(session_id).await;
        tracing::info!(session_id, "Deleted session");

        if let Some(owner) = owner {
            self.forget_shared_session(&owner, session_id).await?;
        }
        Ok(())
    }

    /// Drop a session from the cache (durable state is kept)
    ///
    /// Waits for an in-flight update on the session to finish.
    pub async fn evict(&self, session_id: &str) {
        let slot = self.sessions.read().await.get(session_id).cloned();
        if let Some(slot) = slot {
            Self::reset(&slot).await;
            drop(slot);
            self.prune(session_id).await;
        }
    }

    /// Drop every cached session and shared entry
    pub async fn clear_cache(&self) {
        let slots: Vec<(String, SessionSlot)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        for (session_id, slot) in slots {
            Self::reset(&slot).await;
            drop(slot);
            self.prune(&session_id).await;
        }
        self.shared.write().await.clear();
    }

    /// Forget a slot's contents so the next access reloads
    async fn reset(slot: &SessionSlot) {
        let mut cached = slot.lock().await;
        cached.state = None;
        cached.loaded_at = None;
    }

    /// Number of cached session slots
    pub async fn cached_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// All sessions owned by `user_id`, most recently updated first
    ///
    /// Read straight from the backend; the session cache is left alone.
    pub async fn user_sessions(&self, user_id: &str) -> SwitchboardResult<Vec<SessionState>> {
        let mut sessions = self.backend.list_user_sessions(user_id).await?;
        sessions.sort_by(|a, b| b.metadata.updated_at.cmp(&a.metadata.updated_at));
        Ok(sessions)
    }

    // =========================================================================
    // Shared state
    // =========================================================================

    async fn load_shared(&self, key: &str) -> SwitchboardResult<Option<SharedStateEntry>> {
        if let Some(entry) = self.shared.read().await.get(key) {
            return Ok(Some(entry.clone()));
        }

        let entry = self.backend.load_shared(key).await?;
        if let Some(entry) = &entry {
            self.shared
                .write()
                .await
                .insert(key.to_string(), entry.clone());
        }
        Ok(entry)
    }

    fn check_shared(entry: &SharedStateEntry, ctx: &StateContext, access: Access) -> SwitchboardResult<()> {
        if entry.permissions.check(&ctx.principal, access).is_allowed() {
            Ok(())
        } else {
            tracing::warn!(
                key = %entry.key,
                principal = %ctx.principal,
                action = access.as_str(),
                "Shared state access denied"
            );
            Err(SwitchboardError::permission_denied(
                &ctx.principal,
                access.as_str(),
                &entry.key,
            ))
        }
    }

    /// Keys under `user:{id}:` may only be created by that user or the system
    fn check_reserved(key: &str, ctx: &StateContext) -> SwitchboardResult<()> {
        let reserved_for = key
            .strip_prefix(USER_KEY_PREFIX)
            .and_then(|rest| rest.split_once(':'))
            .map(|(user_id, _)| user_id);

        match reserved_for {
            Some(user_id) if !ctx.is_system() && user_id != ctx.principal => {
                tracing::warn!(key, principal = %ctx.principal, "Refusing to create another user's key");
                Err(SwitchboardError::permission_denied(&ctx.principal, "create", key))
            }
            _ => Ok(()),
        }
    }

    /// Read-modify-write a shared entry as the system, skipping permission checks
    ///
    /// `update` sees the current entry and returns the replacement, or `None`
    /// to leave storage untouched.
    pub(super) async fn replace_shared<F>(
        &self,
        key: &str,
        update: F,
    ) -> SwitchboardResult<Option<SharedStateEntry>>
    where
        F: FnOnce(Option<SharedStateEntry>) -> SwitchboardResult<Option<SharedStateEntry>>,
    {
        let _guard = self.shared_write.lock().await;

        let Some(entry) = update(self.load_shared(key).await?)? else {
            return Ok(None);
        };
        self.backend.save_shared(&entry).await?;
        self.shared
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(Some(entry))
    }

    /// Read a shared entry
    pub async fn get_shared_state(
        &self,
        key: &str,
        ctx: &StateContext,
    ) -> SwitchboardResult<SharedStateEntry> {
        let entry = self
            .load_shared(key)
            .await?
            .ok_or_else(|| SwitchboardError::SharedStateNotFound(key.to_string()))?;

        Self::check_shared(&entry, ctx, Access::Read)?;
        Ok(entry)
    }

    /// Create or replace a shared entry's data
    ///
    /// New entries get `permissions` or the defaults for `scope`. Existing
    /// entries require write access; changing their permissions additionally
    /// requires delete access. Nothing is modified when a check fails.
    pub async fn set_shared_state(
        &self,
        key: &str,
        data: Value,
        scope: StateScope,
        permissions: Option<PermissionSpec>,
        ctx: &StateContext,
    ) -> SwitchboardResult<SharedStateEntry> {
        let _guard = self.shared_write.lock().await;

        let entry = match self.load_shared(key).await? {
            Some(mut existing) => {
                Self::check_shared(&existing, ctx, Access::Write)?;
                if let Some(permissions) = permissions {
                    if permissions != existing.permissions {
                        Self::check_shared(&existing, ctx, Access::Delete)?;
                        existing.permissions = permissions;
                    }
                }
                existing.data = data;
                existing.updated_at = chrono::Utc::now();
                existing
            }
            None => {
                Self::check_reserved(key, ctx)?;
                let permissions =
                    permissions.unwrap_or_else(|| PermissionSpec::for_scope(scope, &ctx.principal));
                tracing::info!(key, ?scope, owner = %ctx.principal, "Creating shared state");
                SharedStateEntry::new(key, data, scope, permissions, &ctx.principal)
            }
        };

        self.backend.save_shared(&entry).await?;
        self.shared
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    /// Delete a shared entry
    pub async fn delete_shared_state(&self, key: &str, ctx: &StateContext) -> SwitchboardResult<()> {
        let _guard = self.shared_write.lock().await;

        let entry = self
            .load_shared(key)
            .await?
            .ok_or_else(|| SwitchboardError::SharedStateNotFound(key.to_string()))?;
        Self::check_shared(&entry, ctx, Access::Delete)?;

        self.backend.delete_shared(key).await?;
        self.shared.write().await.remove(key);
        tracing::info!(key, principal = %ctx.principal, "Deleted shared state");
        Ok(())
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("backend", &self.backend.name())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
