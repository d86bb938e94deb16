//! Cache key derivation and caching policy

use retain_foundation::{canonical_json, digest_hex, CacheConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of hex characters kept from the SHA-256 digest
pub const DIGEST_LEN: usize = 16;

// ============================================================================
// RequestOptions
// ============================================================================

/// Generation options that take part in the cache key (temperature, top_p, ...)
///
/// Backed by an ordered map so iteration and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestOptions(BTreeMap<String, Value>);

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl From<BTreeMap<String, Value>> for RequestOptions {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RequestOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// CacheKey
// ============================================================================

/// Fingerprint of a logical request
///
/// Carries its model so tier 1 can drop a single model's entries and tier 2
/// can namespace keys as `<prefix>:<model>:<digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model: String,
    digest: String,
}

impl CacheKey {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.model, self.digest)
    }
}

// ============================================================================
// KeyDeriver
// ============================================================================

/// Derives [`CacheKey`]s and the shared-tier key names built from them
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
}

impl KeyDeriver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Deterministic key for `(model, prompt, options)`
    ///
    /// Options are canonicalized (keys sorted at every depth) before hashing,
    /// so insertion order never changes the key. Missing options and empty
    /// options produce the same key.
    pub fn derive(&self, model: &str, prompt: &str, options: Option<&RequestOptions>) -> CacheKey {
        let signature = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "options": options.map(RequestOptions::to_value).unwrap_or_else(|| Value::Object(Default::default())),
        });
        let canonical = canonical_json(&signature);

        CacheKey {
            model: model.to_string(),
            digest: digest_hex(canonical.as_bytes(), DIGEST_LEN),
        }
    }

    /// Name of `key` on the shared tier
    pub fn shared_key(&self, key: &CacheKey) -> String {
        format!("{}:{}:{}", self.prefix, key.model, key.digest)
    }

    /// Glob matching exactly the shared keys of one model
    ///
    /// The digest part is matched with one `?` per character, so invalidating
    /// `qwen2.5` leaves `qwen2.5:8b` untouched even though model names may
    /// contain `:`.
    pub fn model_pattern(&self, model: &str) -> String {
        format!(
            "{}:{}:{}",
            self.prefix,
            escape_glob(model),
            "?".repeat(DIGEST_LEN)
        )
    }

    /// Glob matching every key under this prefix
    pub fn namespace_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// Policy
// ============================================================================

/// Whether a prompt may be served from / written to the cache
///
/// Heuristic guard against caching non-idempotent requests: too-short prompts
/// and prompts mentioning a volatility marker are never cached.
pub fn should_cache(prompt: &str, config: &CacheConfig) -> bool {
    if !config.enabled {
        return false;
    }

    if prompt.chars().count() < config.min_prompt_length {
        return false;
    }

    let lowered = prompt.to_lowercase();
    !config
        .volatile_markers
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}
