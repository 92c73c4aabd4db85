//! Switchboard Configuration
//!
//! All sections deserialize with defaults, so a config file only needs the
//! keys it changes. Environment variables prefixed with `SWITCHBOARD_`
//! override file values.
//!
//! ```ignore
//! let config = SwitchboardConfig::from_file("switchboard.json")?
//!     .apply_env()?
//!     .with_storage(StorageConfig::file("./state"));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{SwitchboardError, SwitchboardResult};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SWITCHBOARD_";

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
    pub memory: MemoryConfig,
    pub streaming: StreamingConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

/// Scoring constants for agent selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Highest confidence the keyword strategy may report
    pub confidence_ceiling: f32,
    /// Minimum keyword score for a match to count
    pub min_score: f32,
    /// Confidence reported when falling back to the first registered agent
    pub fallback_confidence: f32,
    /// Confidence floor applied when continuity keeps the previous agent
    pub continuity_floor: f32,
    /// How many recent agent history entries selection looks at
    pub history_window: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_ceiling: 0.9,
            min_score: 1.0,
            fallback_confidence: 0.5,
            continuity_floor: 0.85,
            history_window: 10,
        }
    }
}

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    File,
}

/// Persistence backend and cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Root directory for the file backend
    pub directory: PathBuf,
    /// How long a cached session counts as fresh (None = until evicted)
    pub cache_ttl_secs: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            directory: PathBuf::from("state"),
            cache_ttl_secs: None,
        }
    }
}

impl StorageConfig {
    /// File-backed storage rooted at `dir`
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::File,
            directory: dir.into(),
            cache_ttl_secs: None,
        }
    }

    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

/// Bounds for cross-session memory snapshots and memory queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Most recent sessions included in a snapshot
    pub max_sessions: usize,
    /// Most recent messages kept per session in a snapshot
    pub max_messages_per_session: usize,
    /// Default result limit for memory search
    pub search_limit: usize,
    /// Default limit for listing a user's memories
    pub user_memory_limit: usize,
    /// Default number of context messages built for a query
    pub context_messages: usize,
    /// Session messages handed to the agent on each turn
    pub recent_messages: usize,
    /// Related messages from shared sessions added to each turn
    pub related_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            max_messages_per_session: 20,
            search_limit: 10,
            user_memory_limit: 1000,
            context_messages: 50,
            recent_messages: 20,
            related_messages: 5,
        }
    }
}

/// Simulated streaming for backends that only return whole responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Words per simulated chunk
    pub chunk_words: usize,
    /// Delay between simulated chunks in milliseconds
    pub chunk_delay_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_words: 3,
            chunk_delay_ms: 30,
        }
    }
}

impl StreamingConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// Retry policy for deferred writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Attempts per job before it is reported as failed
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub retry_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PersistenceConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    /// Directory for rolling log files (None = console only)
    pub directory: Option<PathBuf>,
    /// Write file logs as JSON lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            json: true,
        }
    }
}

impl SwitchboardConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> SwitchboardResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            SwitchboardError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SWITCHBOARD_*` overrides from the process environment
    pub fn apply_env(self) -> SwitchboardResult<Self> {
        self.apply_vars(std::env::vars())
    }

    /// Apply overrides from an explicit list of variables
    pub fn apply_vars<I>(mut self, vars: I) -> SwitchboardResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match key {
                "STORAGE_BACKEND" => {
                    self.storage.backend = match value.to_lowercase().as_str() {
                        "memory" => BackendKind::Memory,
                        "file" => BackendKind::File,
                        other => {
                            return Err(SwitchboardError::InvalidConfig(format!(
                                "unknown storage backend '{}'",
                                other
                            )))
                        }
                    }
                }
                "STORAGE_DIR" => self.storage.directory = PathBuf::from(value),
                "CACHE_TTL_SECS" => self.storage.cache_ttl_secs = Some(parse_var(key, &value)?),
                "CONFIDENCE_CEILING" => self.routing.confidence_ceiling = parse_var(key, &value)?,
                "CONTINUITY_FLOOR" => self.routing.continuity_floor = parse_var(key, &value)?,
                "MEMORY_MAX_SESSIONS" => self.memory.max_sessions = parse_var(key, &value)?,
                "CHUNK_WORDS" => self.streaming.chunk_words = parse_var(key, &value)?,
                "CHUNK_DELAY_MS" => self.streaming.chunk_delay_ms = parse_var(key, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_DIR" => self.logging.directory = Some(PathBuf::from(value)),
                _ => tracing::debug!("Ignoring unknown config variable {}", name),
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> SwitchboardResult<()> {
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("routing.confidence_ceiling", self.routing.confidence_ceiling),
            ("routing.fallback_confidence", self.routing.fallback_confidence),
            ("routing.continuity_floor", self.routing.continuity_floor),
        ] {
            if !unit.contains(&value) {
                return Err(SwitchboardError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.routing.history_window == 0 {
            return Err(SwitchboardError::InvalidConfig(
                "routing.history_window must be at least 1".into(),
            ));
        }

        if self.streaming.chunk_words == 0 {
            return Err(SwitchboardError::InvalidConfig(
                "streaming.chunk_words must be at least 1".into(),
            ));
        }

        if self.persistence.max_attempts == 0 {
            return Err(SwitchboardError::InvalidConfig(
                "persistence.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> SwitchboardResult<T> {
    value.trim().parse().map_err(|_| {
        SwitchboardError::InvalidConfig(format!("{}{}: cannot parse '{}'", ENV_PREFIX, key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwitchboardConfig::default();
        assert_eq!(config.routing.confidence_ceiling, 0.9);
        assert_eq!(config.routing.fallback_confidence, 0.5);
        assert_eq!(config.memory.max_sessions, 20);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SwitchboardConfig =
            serde_json::from_str(r#"{"storage": {"backend": "file", "directory": "/tmp/x"}}"#)
                .unwrap();
        assert_eq!(config.storage.backend, BackendKind::File);
        assert_eq!(config.storage.directory, PathBuf::from("/tmp/x"));
        assert_eq!(config.routing.continuity_floor, 0.85);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("switchboard.json");
        std::fs::write(&path, r#"{"memory": {"max_sessions": 5}}"#).unwrap();

        let config = SwitchboardConfig::from_file(&path).unwrap();
        assert_eq!(config.memory.max_sessions, 5);

        std::fs::write(&path, "not json").unwrap();
        let err = SwitchboardConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidConfig(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("SWITCHBOARD_STORAGE_BACKEND".to_string(), "file".to_string()),
            ("SWITCHBOARD_CHUNK_WORDS".to_string(), "5".to_string()),
            ("SWITCHBOARD_LOG_LEVEL".to_string(), "debug".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = SwitchboardConfig::new().apply_vars(vars).unwrap();

        assert_eq!(config.storage.backend, BackendKind::File);
        assert_eq!(config.streaming.chunk_words, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let vars = vec![("SWITCHBOARD_CONFIDENCE_CEILING".to_string(), "1.5".to_string())];
        assert!(SwitchboardConfig::new().apply_vars(vars).is_err());

        let vars = vec![("SWITCHBOARD_CHUNK_WORDS".to_string(), "many".to_string())];
        assert!(SwitchboardConfig::new().apply_vars(vars).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_history_window() {
        let mut routing = RoutingConfig::default();
        routing.history_window = 0;
        let err = SwitchboardConfig::new().with_routing(routing).validate().unwrap_err();
        assert!(err.to_string().contains("history_window"));

        let config: SwitchboardConfig =
            serde_json::from_str(r#"{"routing": {"history_window": 1}}"#).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_turn_context_limits() {
        let config: SwitchboardConfig =
            serde_json::from_str(r#"{"memory": {"recent_messages": 4, "related_messages": 0}}"#).unwrap();
        assert_eq!(config.memory.recent_messages, 4);
        assert_eq!(config.memory.related_messages, 0);
        assert_eq!(SwitchboardConfig::default().memory.recent_messages, 20);
        assert_eq!(SwitchboardConfig::default().memory.related_messages, 5);
    }
}
