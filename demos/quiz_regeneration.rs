//! Quiz generation with caching and an explicit "regenerate" action.
//!
//! Uses the configured backend (`GENCACHE_API_KEY` or the OS keyring); without a
//! key every quiz comes from the fallback generator.
//!
//! ```text
//! RUST_LOG=gencache=debug cargo run --example quiz_regeneration
//! ```

use gencache::features::quiz::{Difficulty, QuizRequest};
use gencache::{CacheableRequest, FeatureCaches};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let caches = FeatureCaches::from_env()?;
    let request = QuizRequest::new("Mitosis", "Cell Division", Difficulty::Easy, 3)
        .with_content("Mitosis splits one cell into two identical daughter cells.");

    let first = caches.quizzes.get_or_generate_entry(&request).await?;
    println!("first lookup ({}):", first.origin());
    for (i, q) in first.artifact().questions.iter().enumerate() {
        println!("  {}. {}", i + 1, q.question);
    }

    let second = caches.quizzes.get_or_generate_entry(&request).await?;
    println!(
        "second lookup served from cache: {}",
        first.same_artifact(&second)
    );

    caches.quizzes.invalidate(&request.cache_key());
    let fresh = caches.quizzes.get_or_generate_entry(&request).await?;
    println!(
        "after regenerate: {} (new quiz id {})",
        fresh.origin(),
        fresh.artifact().id
    );

    let stats = caches.quizzes.stats();
    println!(
        "hits={} misses={} generated={} fallbacks={}",
        stats.hits, stats.misses, stats.generated, stats.fallbacks
    );
    Ok(())
}
