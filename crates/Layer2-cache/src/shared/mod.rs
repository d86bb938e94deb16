//! Tier 2: shared, best-effort network cache
//!
//! The backend sits behind [`SharedBackend`] so the coordinator never depends
//! on a concrete store. [`SharedCache`] wraps a backend with a timeout on
//! every call and a one-way circuit: once a live call fails, the instance
//! stops talking to the backend until it is rebuilt.

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

use async_trait::async_trait;
use parking_lot::RwLock;
use retain_foundation::{Error, Result, SharedCacheConfig};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Backend trait
// ============================================================================

/// Network key-value store usable as tier 2
///
/// Patterns passed to [`SharedBackend::delete_matching`] are globs: `*` and
/// `?` are wildcards and `\` escapes the next character.
#[async_trait]
pub trait SharedBackend: Send + Sync {
    /// Short name used in logs and stats
    fn name(&self) -> &str;

    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every key matching `pattern`, returning how many were removed
    async fn delete_matching(&self, pattern: &str) -> Result<u64>;
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedCacheState {
    /// Probe succeeded and no live call has failed since
    Available,
    /// A live call failed or timed out; the circuit stays open
    Degraded,
    /// Disabled, unreachable at startup, or no backend compiled in
    Unavailable,
}

impl std::fmt::Display for SharedCacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharedCacheState::Available => write!(f, "available"),
            SharedCacheState::Degraded => write!(f, "degraded"),
            SharedCacheState::Unavailable => write!(f, "unavailable"),
        }
    }
}

// ============================================================================
// SharedCache
// ============================================================================

pub struct SharedCache {
    backend: Option<Arc<dyn SharedBackend>>,
    state: RwLock<SharedCacheState>,
    default_ttl: Duration,
    operation_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl SharedCache {
    /// A tier 2 that is permanently unavailable
    pub fn disabled() -> Self {
        Self {
            backend: None,
            state: RwLock::new(SharedCacheState::Unavailable),
            default_ttl: Duration::ZERO,
            operation_timeout: Duration::ZERO,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Connect to the configured store
    ///
    /// Never fails: a disabled config, a build without a backend, or a failed
    /// connection all yield an [`SharedCacheState::Unavailable`] cache.
    pub async fn connect(config: &SharedCacheConfig) -> Self {
        if !config.enabled {
            tracing::debug!("Shared cache disabled by configuration");
            return Self::disabled();
        }

        #[cfg(feature = "redis")]
        {
            match RedisBackend::connect(&config.url, config.connect_timeout()).await {
                Ok(backend) => Self::with_backend(Arc::new(backend), config).await,
                Err(e) => {
                    tracing::warn!("Shared cache unavailable, continuing with local cache only: {}", e);
                    Self::disabled()
                }
            }
        }

        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!("Shared cache requested but no backend is compiled in");
            Self::disabled()
        }
    }

    /// Wrap an existing backend, probing it once
    ///
    /// `config.enabled` is not consulted here; passing a backend is taken as
    /// intent to use it.
    pub async fn with_backend(backend: Arc<dyn SharedBackend>, config: &SharedCacheConfig) -> Self {
        let probe = tokio::time::timeout(config.connect_timeout(), backend.ping()).await;
        let state = match probe {
            Ok(Ok(())) => {
                tracing::info!("Shared cache connected ({})", backend.name());
                SharedCacheState::Available
            }
            Ok(Err(e)) => {
                tracing::warn!("Shared cache probe failed ({}): {}", backend.name(), e);
                SharedCacheState::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    "Shared cache probe timed out after {:?} ({})",
                    config.connect_timeout(),
                    backend.name()
                );
                SharedCacheState::Unavailable
            }
        };

        Self {
            backend: (state == SharedCacheState::Available).then_some(backend),
            state: RwLock::new(state),
            default_ttl: config.ttl(),
            operation_timeout: config.operation_timeout(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SharedCacheState {
        *self.state.read()
    }

    pub fn is_available(&self) -> bool {
        self.state() == SharedCacheState::Available
    }

    /// Look up `key`; any failure reads as a miss
    pub async fn get(&self, key: &str) -> Option<String> {
        let backend = self.live_backend()?;
        match self.guarded("get", backend.get(key)).await {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        }
    }

    /// Store `value`, returning whether the write reached the backend
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let Some(backend) = self.live_backend() else {
            return false;
        };
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.guarded("set", backend.set(key, value, ttl)).await.is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.live_backend() else {
            return false;
        };
        self.guarded("delete", backend.delete(key))
            .await
            .unwrap_or(false)
    }

    /// Delete all keys matching a glob, returning how many were removed
    pub async fn clear_by_pattern(&self, pattern: &str) -> u64 {
        let Some(backend) = self.live_backend() else {
            return 0;
        };
        self.guarded("delete_matching", backend.delete_matching(pattern))
            .await
            .unwrap_or(0)
    }

    pub fn stats(&self) -> SharedCacheStats {
        SharedCacheStats {
            state: self.state(),
            backend: self.backend.as_ref().map(|b| b.name().to_string()),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn live_backend(&self) -> Option<&Arc<dyn SharedBackend>> {
        if self.is_available() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Run a backend call under the operation timeout
    ///
    /// Returns `None` on error or timeout, after opening the circuit.
    async fn guarded<T, F>(&self, op: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.degrade(op, &e);
                None
            }
            Err(_) => {
                let e = Error::Timeout(format!("{} exceeded {:?}", op, self.operation_timeout));
                self.degrade(op, &e);
                None
            }
        }
    }

    fn degrade(&self, op: &str, error: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.write();
        if *state == SharedCacheState::Available {
            *state = SharedCacheState::Degraded;
            tracing::warn!(
                "Shared cache {} failed, disabling tier 2 for this instance: {}",
                op,
                error
            );
        } else {
            tracing::debug!("Shared cache {} failed after degrade: {}", op, error);
        }
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheStats {
    pub state: SharedCacheState,
    pub backend: Option<String>,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBackend {
        entries: Mutex<HashMap<String, String>>,
        refuse_ping: bool,
        fail_calls: bool,
        stall: bool,
    }

    impl FakeBackend {
        fn check(&self) -> Result<()> {
            if self.fail_calls {
                return Err(Error::shared_cache("connection reset"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SharedBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn ping(&self) -> Result<()> {
            if self.refuse_ping {
                return Err(Error::shared_cache("connection refused"));
            }
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.check()?;
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
            self.check()?;
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            self.check()?;
            Ok(self.entries.lock().remove(key).is_some())
        }

        async fn delete_matching(&self, pattern: &str) -> Result<u64> {
            self.check()?;
            let prefix = pattern.trim_end_matches('*');
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            Ok((before - entries.len()) as u64)
        }
    }

    fn config() -> SharedCacheConfig {
        SharedCacheConfig {
            operation_timeout_ms: 50,
            ..SharedCacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let cache = SharedCache::disabled();
        assert_eq!(cache.state(), SharedCacheState::Unavailable);
        assert!(!cache.set("k", "v", None).await);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.clear_by_pattern("*").await, 0);
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_available_round_trip() {
        let cache = SharedCache::with_backend(Arc::new(FakeBackend::default()), &config()).await;
        assert!(cache.is_available());

        assert!(cache.set("retain:m:1", "v", None).await);
        assert_eq!(cache.get("retain:m:1").await, Some("v".to_string()));
        assert_eq!(cache.get("retain:m:2").await, None);
        assert!(cache.delete("retain:m:1").await);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.backend.as_deref(), Some("fake"));
    }

    #[tokio::test]
    async fn test_failed_probe_is_unavailable() {
        let backend = FakeBackend {
            refuse_ping: true,
            ..FakeBackend::default()
        };
        let cache = SharedCache::with_backend(Arc::new(backend), &config()).await;

        assert_eq!(cache.state(), SharedCacheState::Unavailable);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_live_failure_degrades_for_good() {
        let backend = FakeBackend {
            fail_calls: true,
            ..FakeBackend::default()
        };
        let cache = SharedCache::with_backend(Arc::new(backend), &config()).await;
        assert!(cache.is_available());

        assert!(!cache.set("k", "v", None).await);
        assert_eq!(cache.state(), SharedCacheState::Degraded);

        // circuit open: no further calls reach the backend
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let backend = FakeBackend {
            stall: true,
            ..FakeBackend::default()
        };
        let cache = SharedCache::with_backend(Arc::new(backend), &config()).await;

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.state(), SharedCacheState::Degraded);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SharedCacheState::Available.to_string(), "available");
        assert_eq!(
            serde_json::to_string(&SharedCacheState::Degraded).unwrap(),
            "\"degraded\""
        );
    }
}
