//! Durable storage for session and shared state
//!
//! Both record kinds are full-value read-modify-write: writers always store
//! the complete current value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::core::SwitchboardResult;

use super::session::SessionState;
use super::shared::SharedStateEntry;

/// Default directory for file-backed storage
const STATE_DIR: &str = "state";

/// Pluggable persistence backend
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn load_session(&self, session_id: &str) -> SwitchboardResult<Option<SessionState>>;

    async fn save_session(&self, state: &SessionState) -> SwitchboardResult<()>;

    async fn delete_session(&self, session_id: &str) -> SwitchboardResult<()>;

    async fn list_sessions(&self) -> SwitchboardResult<Vec<String>>;

    /// Sessions owned by `user_id`, in no particular order
    async fn list_user_sessions(&self, user_id: &str) -> SwitchboardResult<Vec<SessionState>> {
        let mut sessions = Vec::new();
        for session_id in self.list_sessions().await? {
            if let Some(state) = self.load_session(&session_id).await? {
                if state.user_id() == Some(user_id) {
                    sessions.push(state);
                }
            }
        }
        Ok(sessions)
    }

    async fn load_shared(&self, key: &str) -> SwitchboardResult<Option<SharedStateEntry>>;

    async fn save_shared(&self, entry: &SharedStateEntry) -> SwitchboardResult<()>;

    async fn delete_shared(&self, key: &str) -> SwitchboardResult<()>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Volatile backend, useful for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, SessionState>>,
    shared: RwLock<HashMap<String, SharedStateEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_session(&self, session_id: &str) -> SwitchboardResult<Option<SessionState>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save_session(&self, state: &SessionState) -> SwitchboardResult<()> {
        self.sessions
            .write()
            .await
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> SwitchboardResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> SwitchboardResult<Vec<String>> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }

    async fn list_user_sessions(&self, user_id: &str) -> SwitchboardResult<Vec<SessionState>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|state| state.user_id() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn load_shared(&self, key: &str) -> SwitchboardResult<Option<SharedStateEntry>> {
        Ok(self.shared.read().await.get(key).cloned())
    }

    async fn save_shared(&self, entry: &SharedStateEntry) -> SwitchboardResult<()> {
        self.shared
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn delete_shared(&self, key: &str) -> SwitchboardResult<()> {
        self.shared.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// File backend
// ============================================================================

/// JSON-file backend
///
/// Layout:
/// - `<root>/sessions/<session_id>.json`
/// - `<root>/shared/<encoded key>.json`
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Create a file backend with the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(STATE_DIR),
        }
    }

    /// Create a file backend with a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }

    fn shared_dir(&self) -> PathBuf {
        self.base_dir.join("shared")
    }

    /// Get the file path for a session
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir()
            .join(format!("{}.json", encode_file_name(session_id)))
    }

    /// Get the file path for a shared key
    pub fn shared_path(&self, key: &str) -> PathBuf {
        self.shared_dir()
            .join(format!("{}.json", encode_file_name(key)))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SwitchboardResult<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file and rename so readers never see a torn record
    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> SwitchboardResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove(path: &Path) -> SwitchboardResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_session(&self, session_id: &str) -> SwitchboardResult<Option<SessionState>> {
        Self::read_json(&self.session_path(session_id)).await
    }

    async fn save_session(&self, state: &SessionState) -> SwitchboardResult<()> {
        Self::write_json(&self.session_path(&state.session_id), state).await
    }

    async fn delete_session(&self, session_id: &str) -> SwitchboardResult<()> {
        Self::remove(&self.session_path(session_id)).await
    }

    async fn list_sessions(&self) -> SwitchboardResult<Vec<String>> {
        let dir = self.sessions_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                sessions.push(decode_file_name(stem));
            }
        }

        Ok(sessions)
    }

    async fn load_shared(&self, key: &str) -> SwitchboardResult<Option<SharedStateEntry>> {
        Self::read_json(&self.shared_path(key)).await
    }

    async fn save_shared(&self, entry: &SharedStateEntry) -> SwitchboardResult<()> {
        Self::write_json(&self.shared_path(&entry.key), entry).await
    }

    async fn delete_shared(&self, key: &str) -> SwitchboardResult<()> {
        Self::remove(&self.shared_path(key)).await
    }
}

/// Percent-encode anything outside `[A-Za-z0-9_-]` so keys like
/// `user:42:cross-session-memory` map to portable file names
fn encode_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn decode_file_name(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
