//! # retain-foundation
//!
//! Foundation layer for Retain:
//! - Error: 공통 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (RetentionConfig, CacheConfig, MemoryConfig)
//! - Storage: JsonStore (설정 및 세션 스냅샷)
//! - Cache: LRU/TTL 캐시 기본 구조, canonical hashing
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Layer3: retain-cli                                      │
//! ├───────────────────────────┬─────────────────────────────┤
//! │  Layer2: retain-cache     │  Layer2: retain-memory      │
//! │  (KeyDeriver, tiers,      │  (SessionMemory, compressor,│
//! │   CacheCoordinator)       │   ContextBuilder)           │
//! ├───────────────────────────┴─────────────────────────────┤
//! │  Layer1: retain-foundation                               │
//! │  (Error, Config, JsonStore, LruCache/TtlLruCache, hash)  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    CacheConfig, LocalCacheConfig, MemoryConfig, RetentionConfig, SharedCacheConfig,
    MAX_TTL_SECS, RETENTION_CONFIG_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Cache primitives
// ============================================================================
pub use cache::{canonical_json, digest_hex, LruCache, TtlLruCache};
