//! Config - 통합 설정 관리
//!
//! - `retention.rs` - RetentionConfig 통합 설정 (캐시 + 대화 메모리)

mod retention;

pub use retention::{
    CacheConfig, LocalCacheConfig, MemoryConfig, RetentionConfig, SharedCacheConfig,
    MAX_TTL_SECS, RETENTION_CONFIG_FILE,
};
