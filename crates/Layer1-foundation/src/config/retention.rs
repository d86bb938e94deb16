//! Retention Config - 캐시 및 대화 메모리 설정
//!
//! 모든 값은 serde 기본값을 가지므로 설정 파일에는 바꾸고 싶은 항목만 적으면 된다.
//!
//! ```json
//! {
//!   "cache": { "local": { "capacity": 500 }, "shared": { "enabled": false } },
//!   "memory": { "maxRecentMessages": 8 }
//! }
//! ```

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 설정 파일명
pub const RETENTION_CONFIG_FILE: &str = "retain.json";

/// 캐시 TTL 상한 (1년)
pub const MAX_TTL_SECS: u64 = 365 * 86_400;

/// 환경 변수: 공유 캐시 URL
const ENV_SHARED_URL: &str = "RETAIN_SHARED_CACHE_URL";
/// 환경 변수: 공유 캐시 사용 여부
const ENV_SHARED_ENABLED: &str = "RETAIN_SHARED_CACHE_ENABLED";
/// 환경 변수: 캐시 전체 사용 여부
const ENV_CACHE_ENABLED: &str = "RETAIN_CACHE_ENABLED";

// ============================================================================
// RetentionConfig (통합)
// ============================================================================

/// Retain 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// 응답 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,

    /// 대화 메모리 설정
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl RetentionConfig {
    /// Resource-constrained preset
    pub fn minimal() -> Self {
        Self {
            cache: CacheConfig::minimal(),
            memory: MemoryConfig::minimal(),
        }
    }

    /// Larger caches and longer conversation windows
    pub fn performance() -> Self {
        Self {
            cache: CacheConfig::performance(),
            memory: MemoryConfig::performance(),
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 파일에서 로드 (`.toml` 이면 TOML, 그 외에는 JSON)
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 저장소의 `retain.json` 로드 (없으면 기본값)
    pub fn load(store: &JsonStore) -> Result<Self> {
        let config = store
            .load_optional::<Self>(RETENTION_CONFIG_FILE)?
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// 저장소에 저장
    pub fn save(&self, store: &JsonStore) -> Result<()> {
        store.save(RETENTION_CONFIG_FILE, self)
    }

    /// 환경 변수 오버라이드 적용
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// 오버라이드 적용 (lookup 함수로 값 조회)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SHARED_URL) {
            self.cache.shared.url = url;
        }
        if let Some(value) = lookup(ENV_SHARED_ENABLED) {
            self.cache.shared.enabled = parse_flag(ENV_SHARED_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = parse_flag(ENV_CACHE_ENABLED, &value)?;
        }
        Ok(())
    }

    /// 전체 설정 검증
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.memory.validate()
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean flag, got '{}'",
            name, other
        ))),
    }
}

// ============================================================================
// Cache Config
// ============================================================================

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Master switch; when false every request bypasses both tiers
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Prompts shorter than this (in characters) are never cached
    #[serde(default = "default_min_prompt_length")]
    pub min_prompt_length: usize,

    /// Substrings that mark a prompt as non-idempotent (matched case-insensitively)
    #[serde(default = "default_volatile_markers")]
    pub volatile_markers: Vec<String>,

    /// Tier 1 (in-process)
    #[serde(default)]
    pub local: LocalCacheConfig,

    /// Tier 2 (network-backed)
    #[serde(default)]
    pub shared: SharedCacheConfig,
}

/// Tier 1 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheConfig {
    /// Maximum number of entries before LRU eviction
    #[serde(default = "default_local_capacity")]
    pub capacity: usize,

    /// Per-entry time-to-live (seconds)
    #[serde(default = "default_local_ttl_secs")]
    pub ttl_secs: u64,
}

/// Tier 2 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheConfig {
    #[serde(default = "default_shared_enabled")]
    pub enabled: bool,

    /// Connection target, e.g. `redis://127.0.0.1:6379/0`
    #[serde(default = "default_shared_url")]
    pub url: String,

    /// Namespace prefix for every key written to the shared tier
    #[serde(default = "default_shared_prefix")]
    pub prefix: String,

    /// Default time-to-live (seconds)
    #[serde(default = "default_shared_ttl_secs")]
    pub ttl_secs: u64,

    /// Budget for the connectivity probe at construction
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Budget for each live call; exceeding it opens the circuit
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

// Default value functions
fn default_cache_enabled() -> bool {
    true
}
fn default_min_prompt_length() -> usize {
    10
}
fn default_volatile_markers() -> Vec<String> {
    ["timestamp", "uuid", "current_time", "random"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}
fn default_local_capacity() -> usize {
    1000
}
fn default_local_ttl_secs() -> u64 {
    3600
} // 1 hour
fn default_shared_enabled() -> bool {
    true
}
fn default_shared_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}
fn default_shared_prefix() -> String {
    "retain".to_string()
}
fn default_shared_ttl_secs() -> u64 {
    86_400
} // 24 hours
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_operation_timeout_ms() -> u64 {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            min_prompt_length: default_min_prompt_length(),
            volatile_markers: default_volatile_markers(),
            local: LocalCacheConfig::default(),
            shared: SharedCacheConfig::default(),
        }
    }
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_local_capacity(),
            ttl_secs: default_local_ttl_secs(),
        }
    }
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_shared_enabled(),
            url: default_shared_url(),
            prefix: default_shared_prefix(),
            ttl_secs: default_shared_ttl_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl LocalCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl SharedCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Tier 2 turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

impl CacheConfig {
    /// Create a minimal config for resource-constrained environments
    pub fn minimal() -> Self {
        Self {
            local: LocalCacheConfig {
                capacity: 100,
                ttl_secs: 900, // 15 minutes
            },
            shared: SharedCacheConfig::disabled(),
            ..Default::default()
        }
    }

    /// Create an aggressive caching config for performance
    pub fn performance() -> Self {
        Self {
            local: LocalCacheConfig {
                capacity: 5000,
                ttl_secs: 7200, // 2 hours
            },
            shared: SharedCacheConfig {
                ttl_secs: 7 * 86_400,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if self.local.capacity == 0 {
            return Err(Error::config("cache.local.capacity must be greater than zero"));
        }
        if self.local.ttl_secs == 0 {
            return Err(Error::config("cache.local.ttlSecs must be greater than zero"));
        }
        if self.shared.ttl_secs == 0 {
            return Err(Error::config("cache.shared.ttlSecs must be greater than zero"));
        }
        if self.local.ttl_secs > MAX_TTL_SECS || self.shared.ttl_secs > MAX_TTL_SECS {
            return Err(Error::config(format!(
                "cache ttlSecs must not exceed {} (one year)",
                MAX_TTL_SECS
            )));
        }
        if self.shared.prefix.is_empty() {
            return Err(Error::config("cache.shared.prefix must not be empty"));
        }
        if self
            .shared
            .prefix
            .chars()
            .any(|c| matches!(c, ':' | '*' | '?' | '[' | ']' | '\\'))
        {
            return Err(Error::config(format!(
                "cache.shared.prefix '{}' must not contain ':' or glob characters",
                self.shared.prefix
            )));
        }
        if self.shared.enabled && self.shared.url.trim().is_empty() {
            return Err(Error::config("cache.shared.url is required when the shared tier is enabled"));
        }
        if self.shared.connect_timeout_ms == 0 || self.shared.operation_timeout_ms == 0 {
            return Err(Error::config("cache.shared timeouts must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Memory Config
// ============================================================================

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Messages kept in full after a compression pass (R)
    #[serde(default = "default_max_recent_messages")]
    pub max_recent_messages: usize,

    /// Summaries retained per session (S)
    #[serde(default = "default_max_summary_messages")]
    pub max_summary_messages: usize,

    /// Compression runs when the recent window grows past this size
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Demoted messages must score strictly above this to be summarized
    #[serde(default = "default_retention_threshold")]
    pub retention_threshold: f64,

    /// Approximate token budget for assembled context
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

fn default_max_recent_messages() -> usize {
    5
}
fn default_max_summary_messages() -> usize {
    10
}
fn default_compression_threshold() -> usize {
    10
}
fn default_retention_threshold() -> f64 {
    0.6
}
fn default_max_context_tokens() -> usize {
    3000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_recent_messages: default_max_recent_messages(),
            max_summary_messages: default_max_summary_messages(),
            compression_threshold: default_compression_threshold(),
            retention_threshold: default_retention_threshold(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

impl MemoryConfig {
    /// Many concurrent users, tight RAM
    pub fn minimal() -> Self {
        Self {
            max_recent_messages: 3,
            max_summary_messages: 5,
            compression_threshold: 5,
            max_context_tokens: 2000,
            ..Default::default()
        }
    }

    /// Long, multi-topic conversations on large-context models
    pub fn performance() -> Self {
        Self {
            max_recent_messages: 10,
            max_summary_messages: 20,
            compression_threshold: 15,
            max_context_tokens: 8000,
            ..Default::default()
        }
    }

    /// Window size equal to the compression trigger: `|recent|` never exceeds `size`
    pub fn with_window(mut self, size: usize) -> Self {
        self.max_recent_messages = size;
        self.compression_threshold = size;
        self
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if self.max_recent_messages == 0 {
            return Err(Error::config("memory.maxRecentMessages must be greater than zero"));
        }
        if self.compression_threshold == 0 {
            return Err(Error::config("memory.compressionThreshold must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.retention_threshold) {
            return Err(Error::config(format!(
                "memory.retentionThreshold must be within [0, 1], got {}",
                self.retention_threshold
            )));
        }
        if self.max_context_tokens == 0 {
            return Err(Error::config("memory.maxContextTokens must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetentionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.local.capacity, 1000);
        assert_eq!(config.cache.min_prompt_length, 10);
        assert_eq!(config.memory.max_recent_messages, 5);
        assert!((config.memory.retention_threshold - 0.6).abs() < f64::EPSILON);

        assert!(RetentionConfig::minimal().validate().is_ok());
        assert!(RetentionConfig::performance().validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds_fail_fast() {
        let mut cache = CacheConfig::default();
        cache.local.capacity = 0;
        assert!(matches!(cache.validate(), Err(Error::Config(_))));

        let mut cache = CacheConfig::default();
        cache.shared.prefix = "a:b".into();
        assert!(cache.validate().is_err());

        let mut cache = CacheConfig::default();
        cache.local.ttl_secs = u64::MAX;
        assert!(matches!(cache.validate(), Err(Error::Config(_))));

        let mut cache = CacheConfig::default();
        cache.shared.ttl_secs = MAX_TTL_SECS + 1;
        assert!(cache.validate().is_err());

        let mut memory = MemoryConfig::default();
        memory.retention_threshold = 1.5;
        assert!(memory.validate().is_err());

        let mut memory = MemoryConfig::default();
        memory.max_recent_messages = 0;
        assert!(memory.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "cache": { "local": { "capacity": 42 } }, "memory": { "maxRecentMessages": 7 } }"#;
        let config: RetentionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache.local.capacity, 42);
        assert_eq!(config.cache.local.ttl_secs, 3600);
        assert_eq!(config.memory.max_recent_messages, 7);
        assert_eq!(config.memory.max_summary_messages, 10);
        assert_eq!(config.cache.shared.prefix, "retain");
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retain.toml");
        std::fs::write(
            &path,
            "[cache.shared]\nenabled = false\n\n[memory]\nmaxContextTokens = 1200\n",
        )
        .unwrap();

        let config = RetentionConfig::load_file(&path).unwrap();
        assert!(!config.cache.shared.enabled);
        assert_eq!(config.memory.max_context_tokens, 1200);
    }

    #[test]
    fn test_load_store_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let config = RetentionConfig::load(&store).unwrap();
        assert_eq!(config.cache.local.capacity, 1000);

        let mut custom = RetentionConfig::minimal();
        custom.memory.max_summary_messages = 3;
        custom.save(&store).unwrap();
        let reloaded = RetentionConfig::load(&store).unwrap();
        assert_eq!(reloaded.memory.max_summary_messages, 3);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RETAIN_SHARED_CACHE_URL", "redis://cache:6380/1"),
            ("RETAIN_SHARED_CACHE_ENABLED", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = RetentionConfig::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.cache.shared.url, "redis://cache:6380/1");
        assert!(!config.cache.shared.enabled);
        assert!(config.cache.enabled);

        let mut config = RetentionConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "RETAIN_CACHE_ENABLED").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }
}
