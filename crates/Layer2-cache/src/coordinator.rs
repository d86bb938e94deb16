//! CacheCoordinator - tier orchestration over a generator call

use crate::key::{should_cache, CacheKey, KeyDeriver, RequestOptions};
use crate::local::{LocalCache, LocalCacheStats};
use crate::shared::{SharedCache, SharedCacheStats};
use retain_foundation::{CacheConfig, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Where a lookup was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Local,
    Shared,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    tier1_hits: AtomicU64,
    tier2_hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
    generation_errors: AtomicU64,
}

/// Read-through, write-through cache in front of a generator
///
/// Lookup order is tier 1, tier 2, then the generator. A tier-2 hit is
/// promoted into tier 1 and a generated value is written to both tiers.
/// Concurrent misses on the same key are not coalesced: each caller runs its
/// own generator and the last write wins.
pub struct CacheCoordinator {
    config: CacheConfig,
    keys: KeyDeriver,
    local: LocalCache,
    shared: SharedCache,
    counters: Counters,
}

impl CacheCoordinator {
    /// Build both tiers from configuration
    ///
    /// Fails only on invalid configuration; an unreachable shared store
    /// leaves tier 2 unavailable.
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let shared = SharedCache::connect(&config.shared).await;
        Self::with_shared(config, shared)
    }

    /// Build with an already constructed tier 2
    pub fn with_shared(config: CacheConfig, shared: SharedCache) -> Result<Self> {
        config.validate()?;

        let coordinator = Self {
            keys: KeyDeriver::new(config.shared.prefix.clone()),
            local: LocalCache::from_config(&config.local),
            shared,
            config,
            counters: Counters::default(),
        };

        tracing::info!(
            capacity = coordinator.config.local.capacity,
            shared = %coordinator.shared.state(),
            "Cache coordinator ready"
        );

        Ok(coordinator)
    }

    /// Tier 1 only
    pub fn local_only(config: CacheConfig) -> Result<Self> {
        Self::with_shared(config, SharedCache::disabled())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub fn shared(&self) -> &SharedCache {
        &self.shared
    }

    pub fn should_cache(&self, prompt: &str) -> bool {
        should_cache(prompt, &self.config)
    }

    pub fn derive_key(&self, model: &str, prompt: &str, options: Option<&RequestOptions>) -> CacheKey {
        self.keys.derive(model, prompt, options)
    }

    // ========================================================================
    // Read-through
    // ========================================================================

    /// Return a cached response or produce, store and return a fresh one
    ///
    /// `ttl` overrides the tier-2 expiry and caps the tier-1 expiry. A
    /// generator error is returned unchanged and nothing is cached. If the
    /// returned future is dropped before the generator finishes, no tier is
    /// written.
    pub async fn get_or_generate<F, Fut, E>(
        &self,
        model: &str,
        prompt: &str,
        generator: F,
        options: Option<&RequestOptions>,
        ttl: Option<Duration>,
    ) -> std::result::Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
    {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        if !self.should_cache(prompt) {
            self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(model = %model, "Prompt not cacheable, bypassing");
            return generator().await;
        }

        let key = self.keys.derive(model, prompt, options);

        if let Some((value, tier)) = self.lookup(&key, ttl).await {
            match tier {
                Tier::Local => self.counters.tier1_hits.fetch_add(1, Ordering::Relaxed),
                Tier::Shared => self.counters.tier2_hits.fetch_add(1, Ordering::Relaxed),
            };
            return Ok(value);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Cache miss, generating");

        let response = match generator().await {
            Ok(response) => response,
            Err(e) => {
                self.counters.generation_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        self.store(key, &response, ttl).await;
        Ok(response)
    }

    // ========================================================================
    // Manual access
    // ========================================================================

    /// Cached response for a request, if any tier has it
    ///
    /// Uncacheable prompts always read as absent.
    pub async fn get(&self, model: &str, prompt: &str, options: Option<&RequestOptions>) -> Option<String> {
        if !self.should_cache(prompt) {
            return None;
        }
        let key = self.keys.derive(model, prompt, options);
        self.lookup(&key, None).await.map(|(value, _)| value)
    }

    /// Store a response in both tiers
    ///
    /// Returns `false` without storing when the prompt is not cacheable.
    pub async fn set(
        &self,
        model: &str,
        prompt: &str,
        value: &str,
        options: Option<&RequestOptions>,
        ttl: Option<Duration>,
    ) -> bool {
        if !self.should_cache(prompt) {
            return false;
        }
        let key = self.keys.derive(model, prompt, options);
        self.store(key, value, ttl).await;
        true
    }

    async fn lookup(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<(String, Tier)> {
        if let Some(value) = self.local.get(key) {
            tracing::debug!(key = %key, "Tier 1 hit");
            return Some((value, Tier::Local));
        }

        let shared_key = self.keys.shared_key(key);
        let value = self.shared.get(&shared_key).await?;
        tracing::debug!(key = %key, "Tier 2 hit, promoting");
        self.local
            .set_with_ttl(key.clone(), value.clone(), self.local_ttl(ttl));
        Some((value, Tier::Shared))
    }

    async fn store(&self, key: CacheKey, value: &str, ttl: Option<Duration>) {
        let shared_key = self.keys.shared_key(&key);
        self.local
            .set_with_ttl(key, value.to_string(), self.local_ttl(ttl));
        self.shared.set(&shared_key, value, ttl).await;
    }

    /// Tier-1 expiry: the configured TTL, or a shorter caller TTL
    fn local_ttl(&self, ttl: Option<Duration>) -> Duration {
        let default = self.config.local.ttl();
        ttl.map_or(default, |custom| custom.min(default))
    }

    // ========================================================================
    // Invalidation & stats
    // ========================================================================

    /// Drop cached responses for one model, or for every model
    pub async fn invalidate(&self, model: Option<&str>) -> InvalidationReport {
        let report = match model {
            Some(model) => InvalidationReport {
                model: Some(model.to_string()),
                local_removed: self.local.invalidate_model(model),
                shared_removed: self
                    .shared
                    .clear_by_pattern(&self.keys.model_pattern(model))
                    .await,
            },
            None => InvalidationReport {
                model: None,
                local_removed: self.local.clear(),
                shared_removed: self
                    .shared
                    .clear_by_pattern(&self.keys.namespace_pattern())
                    .await,
            },
        };

        tracing::info!(
            model = report.model.as_deref().unwrap_or("*"),
            local = report.local_removed,
            shared = report.shared_removed,
            "Cache invalidated"
        );

        report
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        let total_requests = load(&self.counters.total_requests);
        let tier1_hits = load(&self.counters.tier1_hits);
        let tier2_hits = load(&self.counters.tier2_hits);
        let misses = load(&self.counters.misses);
        let hits = tier1_hits + tier2_hits;

        CacheStats {
            total_requests,
            tier1_hits,
            tier2_hits,
            misses,
            bypassed: load(&self.counters.bypassed),
            generation_errors: load(&self.counters.generation_errors),
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                hits as f64 / total_requests as f64
            },
            speedup: hits as f64 / misses.max(1) as f64,
            local: self.local.stats(),
            shared: self.shared.stats(),
        }
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("prefix", &self.keys.prefix())
            .field("local", &self.local)
            .field("shared", &self.shared)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    /// `None` for a full clear
    pub model: Option<String>,
    pub local_removed: usize,
    pub shared_removed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_requests: u64,
    pub tier1_hits: u64,
    pub tier2_hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub generation_errors: u64,
    pub hit_rate: f64,
    pub speedup: f64,
    pub local: LocalCacheStats,
    pub shared: SharedCacheStats,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "CACHE STATISTICS")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Total requests:     {}", self.total_requests)?;
        writeln!(f, "Overall hit rate:   {:.1}%", self.hit_rate * 100.0)?;
        writeln!(f, "Speedup:            {:.1}x", self.speedup)?;
        writeln!(f)?;
        writeln!(f, "Tier 1 hits:        {}", self.tier1_hits)?;
        writeln!(f, "Tier 2 hits:        {}", self.tier2_hits)?;
        writeln!(f, "Misses (generated): {}", self.misses)?;
        writeln!(f, "Bypassed:           {}", self.bypassed)?;
        writeln!(f)?;
        writeln!(
            f,
            "Tier 1 usage:       {}/{}",
            self.local.size, self.local.capacity
        )?;
        writeln!(f, "Tier 2 status:      {}", self.shared.state)?;
        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retain_foundation::Error;

    fn coordinator() -> CacheCoordinator {
        CacheCoordinator::local_only(CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = CacheConfig::default();
        config.local.capacity = 0;
        assert!(CacheCoordinator::local_only(config).is_err());

        let mut config = CacheConfig::default();
        config.local.ttl_secs = u64::MAX;
        assert!(CacheCoordinator::local_only(config).is_err());
    }

    #[tokio::test]
    async fn test_huge_per_call_ttl_is_stored() {
        let cache = coordinator();
        let out: std::result::Result<String, Error> = cache
            .get_or_generate(
                "m",
                "What is Python?",
                || async { Ok("x".to_string()) },
                None,
                Some(Duration::MAX),
            )
            .await;
        assert_eq!(out.unwrap(), "x");
        assert_eq!(
            cache.get("m", "What is Python?", None).await.as_deref(),
            Some("x")
        );
    }

    #[test]
    fn test_local_ttl_takes_shorter() {
        let cache = coordinator();
        let default = cache.config().local.ttl();

        assert_eq!(cache.local_ttl(None), default);
        assert_eq!(
            cache.local_ttl(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(cache.local_ttl(Some(default * 10)), default);
    }

    #[tokio::test]
    async fn test_manual_get_set() {
        let cache = coordinator();
        assert!(cache.set("m", "What is Python?", "A language", None, None).await);
        assert_eq!(
            cache.get("m", "What is Python?", None).await.as_deref(),
            Some("A language")
        );

        // uncacheable prompts are never stored
        assert!(!cache.set("m", "hi", "hello", None, None).await);
        assert_eq!(cache.get("m", "hi", None).await, None);

        // manual access is not a request
        assert_eq!(cache.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_stats_rates() {
        let cache = coordinator();
        let prompt = "Explain the borrow checker briefly";

        for _ in 0..3 {
            let out: std::result::Result<String, Error> = cache
                .get_or_generate("m", prompt, || async { Ok("answer".to_string()) }, None, None)
                .await;
            assert_eq!(out.unwrap(), "answer");
        }

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.tier1_hits, 2);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.speedup - 2.0).abs() < 1e-9);
        assert!(stats.to_string().contains("Tier 1 hits:        2"));
    }
}
