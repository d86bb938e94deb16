//! Cache utilities
//!
//! - `LruCache`: Simple LRU cache
//! - `TtlLruCache`: LRU cache with per-entry TTL
//! - `hash`: canonical serialization and SHA-256 digests

mod hash;
mod lru;

pub use hash::{canonical_json, digest_hex};
pub use lru::{LruCache, TtlLruCache};
