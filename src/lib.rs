//! # gencache
//!
//! 面向学习平台的 AI 生成结果缓存：相同请求只生成一次，生成失败时返回本地降级结果。
//!
//! Generation cache for AI-assisted learning features. Lesson summaries, quizzes,
//! pacing plans and recommendations are expensive to generate and rarely change, so
//! each one is generated once per logical request and reused afterwards.
//!
//! ## Overview
//!
//! - **Deterministic keys**: a request derives its key from the fields that affect the artifact
//! - **Always an answer**: any generation failure is answered with a fallback artifact
//! - **One call per key**: concurrent misses on the same key share a single generation
//! - **Degraded mode**: a circuit breaker stops calling a backend that keeps failing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gencache::features::quiz::{Difficulty, QuizRequest};
//! use gencache::FeatureCaches;
//!
//! #[tokio::main]
//! async fn main() -> gencache::Result<()> {
//!     let caches = FeatureCaches::from_env()?;
//!
//!     let request = QuizRequest::new("Mitosis", "Cell Division", Difficulty::Easy, 5);
//!     let quiz = caches.quizzes.get_or_generate(&request).await?;
//!     println!("{} questions", quiz.questions.len());
//!
//!     // "Regenerate" in the UI.
//!     caches.quizzes.invalidate(&gencache::CacheableRequest::cache_key(&request));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Generic lookup-or-generate cache, keys, entries and policy |
//! | [`features`] | Summary, quiz, pacing and recommendation adapters |
//! | [`structured`] | JSON extraction and schema validation of model output |
//! | [`transport`] | Text generation backends (HTTP, offline) |
//! | [`resilience`] | Circuit breaker for degraded mode |
//! | [`error`] | Caller-visible errors and generation failures |

pub mod cache;
pub mod features;
pub mod resilience;
pub mod structured;
pub mod transport;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheEntry, CacheKey, CacheStats, CacheableRequest, FallbackGenerator,
    GenerationCache, GenerationCacheBuilder, Generator, Origin,
};
pub use features::{Feature, FeatureCaches, FeatureFallback, PromptedGenerator};
pub use transport::{Prompt, TextGenerator};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, GenerationFailure};
