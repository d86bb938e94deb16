//! Error types for Retain
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Retain 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 입력 관련
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 공유 캐시 (tier 2) 관련
    // ========================================================================
    #[error("Shared cache error: {0}")]
    SharedCache(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// 설정 에러 생성 헬퍼
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// 공유 캐시 에러 생성 헬퍼
    pub fn shared_cache(message: impl std::fmt::Display) -> Self {
        Error::SharedCache(message.to_string())
    }
}
