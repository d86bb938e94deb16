//! # Retain Cache Primitives
//!
//! Building blocks shared by the response cache tiers:
//!
//! - [`LruCache`] - bounded map with least-recently-used eviction
//! - [`TtlLruCache`] - LRU cache whose entries expire lazily on access
//! - [`canonical_json`] / [`digest_hex`] - order-independent fingerprints
//!
//! The tiers themselves (local, shared, coordinator) live in `retain-cache`.

pub mod util;

pub use util::{canonical_json, digest_hex, LruCache, TtlLruCache};
