//! Capabilities the cache composes.

use super::key::CacheKey;
use crate::error::GenerationFailure;
use crate::Result;
use async_trait::async_trait;

/// A request that knows its own cache key.
pub trait CacheableRequest: Send + Sync {
    /// Reject requests that lack the fields the key is derived from.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Pure function of the request fields that affect the artifact.
    fn cache_key(&self) -> CacheKey;
}

/// The external, fallible producer of artifacts (typically a hosted model).
#[async_trait]
pub trait Generator<R, A>: Send + Sync
where
    R: Send + Sync,
    A: Send,
{
    async fn generate(&self, request: &R) -> std::result::Result<A, GenerationFailure>;

    fn name(&self) -> &str {
        "generator"
    }
}

/// Local producer of a structurally valid, generic artifact. Must not fail.
pub trait FallbackGenerator<R, A>: Send + Sync {
    fn fallback(&self, request: &R) -> A;
}

impl<R, A, F> FallbackGenerator<R, A> for F
where
    F: Fn(&R) -> A + Send + Sync,
{
    fn fallback(&self, request: &R) -> A {
        self(request)
    }
}
