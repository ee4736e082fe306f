//! 生成缓存模块：按请求派生的键缓存 AI 生成结果，生成失败时返回本地降级结果。
//!
//! # Generation Cache Module
//!
//! Several learning features (lesson summaries, quizzes, pacing suggestions,
//! recommendations) ask a hosted model for the same artifact over and over. This
//! module keeps the first answer per request and guarantees an answer even when the
//! model is unavailable.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`GenerationCache`] | Lookup-or-generate with fallback, invalidation and statistics |
//! | [`CacheConfig`] | Fallback caching, coalescing and timeout policy |
//! | [`CacheKey`] | Hashed key derived from the relevant request fields |
//! | [`CacheEntry`] | Stored artifact plus its [`Origin`] |
//! | [`Generator`] | The external, fallible producer |
//! | [`FallbackGenerator`] | The local, infallible producer |
//!
//! ## Lookup
//!
//! 1. Derive the key from the request.
//! 2. Hit: return the stored artifact; the generator is not called.
//! 3. Miss: call the generator. On success store and return the artifact. On any
//!    failure build a fallback artifact, store it (unless
//!    [`CacheConfig::cache_fallback`] is off) and return it.
//!
//! Entries are kept for the lifetime of the cache instance. There is no TTL and
//! no eviction; [`GenerationCache::clear`] backs explicit "regenerate" actions.

mod config;
mod entry;
mod key;
mod manager;
mod traits;

pub use config::CacheConfig;
pub use entry::{CacheEntry, Origin};
pub use key::{content_digest, CacheKey, CacheKeyBuilder};
pub use manager::{CacheStats, GenerationCache, GenerationCacheBuilder};
pub use traits::{CacheableRequest, FallbackGenerator, Generator};
