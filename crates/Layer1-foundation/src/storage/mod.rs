//! Storage module for Retain
//!
//! - `json`: JSON - 설정 파일 및 세션 스냅샷 저장/로드

mod json;

// JSON Storage (범용)
pub use json::JsonStore;
