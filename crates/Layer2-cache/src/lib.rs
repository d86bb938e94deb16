//! # retain-cache
//!
//! Tiered response cache placed in front of an expensive generation call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  CacheCoordinator                        │
//! │  get_or_generate(model, prompt, generator, options, ttl) │
//! ├─────────────────────────────────────────────────────────┤
//! │  Tier 1: LocalCache   in-process, LRU + TTL   (~µs)      │  checked first
//! ├─────────────────────────────────────────────────────────┤
//! │  Tier 2: SharedCache  network KV, best-effort (~ms)      │  hit → promote to tier 1
//! ├─────────────────────────────────────────────────────────┤
//! │  Miss:   generator()  external model call     (~s)       │  result written through
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier 2 never fails a request: a failed probe or live call switches it off
//! for the lifetime of the [`SharedCache`] instance and the coordinator keeps
//! serving from tier 1 and the generator.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retain_cache::{CacheCoordinator, RequestOptions};
//! use retain_foundation::CacheConfig;
//!
//! let cache = CacheCoordinator::new(CacheConfig::default()).await?;
//!
//! let options = RequestOptions::new().with("temperature", 0.2);
//! let answer = cache
//!     .get_or_generate("qwen2.5:8b", "What is Python?", || call_model(), Some(&options), None)
//!     .await?;
//!
//! println!("{}", cache.stats());
//! ```

pub mod coordinator;
pub mod key;
pub mod local;
pub mod shared;

pub use coordinator::{CacheCoordinator, CacheStats, InvalidationReport};
pub use key::{should_cache, CacheKey, KeyDeriver, RequestOptions, DIGEST_LEN};
pub use local::{LocalCache, LocalCacheStats};
pub use shared::{SharedBackend, SharedCache, SharedCacheState, SharedCacheStats};

#[cfg(feature = "redis")]
pub use shared::RedisBackend;
