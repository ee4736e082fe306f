//! Stored artifacts.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a stored artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Produced by the external generator.
    Generated,
    /// Produced locally after the external generator failed.
    Fallback,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Generated => "generated",
            Origin::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An artifact owned by the cache together with its metadata.
///
/// Cloning an entry shares the artifact; callers only ever see it through `Arc<A>`.
#[derive(Debug)]
pub struct CacheEntry<A> {
    artifact: Arc<A>,
    origin: Origin,
    created_at: Instant,
}

impl<A> Clone for CacheEntry<A> {
    fn clone(&self) -> Self {
        Self {
            artifact: Arc::clone(&self.artifact),
            origin: self.origin,
            created_at: self.created_at,
        }
    }
}

impl<A> CacheEntry<A> {
    pub fn generated(artifact: A) -> Self {
        Self::new(artifact, Origin::Generated)
    }

    pub fn fallback(artifact: A) -> Self {
        Self::new(artifact, Origin::Fallback)
    }

    fn new(artifact: A, origin: Origin) -> Self {
        Self {
            artifact: Arc::new(artifact),
            origin,
            created_at: Instant::now(),
        }
    }

    pub fn artifact(&self) -> &Arc<A> {
        &self.artifact
    }

    pub fn into_artifact(self) -> Arc<A> {
        self.artifact
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Origin::Fallback
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// True when both entries hand out the same artifact instance.
    pub fn same_artifact(&self, other: &CacheEntry<A>) -> bool {
        Arc::ptr_eq(&self.artifact, &other.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_artifact() {
        let entry = CacheEntry::generated(vec![1, 2, 3]);
        let copy = entry.clone();
        assert!(entry.same_artifact(&copy));
        assert_eq!(copy.origin(), Origin::Generated);
        assert!(!copy.is_fallback());
    }

    #[test]
    fn test_fallback_origin() {
        let entry = CacheEntry::fallback("placeholder");
        assert!(entry.is_fallback());
        assert_eq!(entry.origin().to_string(), "fallback");
        assert_eq!(**entry.artifact(), "placeholder");
    }
}
