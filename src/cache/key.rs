//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deterministic key for one logical generation request.
///
/// The hash covers the namespace and every named field. Fields are JSON-encoded
/// before hashing, so values containing separators cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub namespace: String,
    pub hash: String,
}

impl CacheKey {
    pub fn builder(namespace: impl Into<String>) -> CacheKeyBuilder {
        CacheKeyBuilder::new(namespace)
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        match self.hash.char_indices().nth(12) {
            Some((end, _)) => &self.hash[..end],
            None => &self.hash,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.short())
    }
}

/// Collects the semantically relevant fields of a request.
///
/// ```
/// use gencache::cache::CacheKey;
///
/// let a = CacheKey::builder("quiz").field("topic", "Cell Division").field("count", 5).build();
/// let b = CacheKey::builder("quiz").field("count", 5).field("topic", "Cell Division").build();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
    parts: BTreeMap<String, serde_json::Value>,
}

impl CacheKeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            parts: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.parts.insert(name.into(), value);
        self
    }

    /// Order-insensitive set of strings: `["b", "a", "a"]` and `["a", "b"]` hash alike.
    pub fn field_set<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        set.sort();
        set.dedup();
        self.field(name, set)
    }

    /// Content-sensitive field without carrying the whole text in the canonical form.
    pub fn field_digest(self, name: impl Into<String>, content: &str) -> Self {
        self.field(name, content_digest(content))
    }

    pub fn build(self) -> CacheKey {
        let canonical = serde_json::json!({
            "namespace": self.namespace,
            "fields": self.parts,
        });
        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        CacheKey {
            namespace: self.namespace,
            hash: hex_sha256(encoded.as_bytes()),
        }
    }
}

/// SHA-256 of a text, hex encoded.
pub fn content_digest(content: &str) -> String {
    hex_sha256(content.as_bytes())
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
