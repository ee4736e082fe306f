//! Degraded mode: every feature keeps answering while the backend is unreachable.
//!
//! Points the HTTP generator at a closed local port, so each generation fails and
//! the shared circuit breaker opens after the first few failures.
//!
//! ```text
//! RUST_LOG=gencache=info cargo run --example degraded_mode
//! ```

use gencache::features::pacing::PacingRequest;
use gencache::features::recommendations::{LessonRef, RecommendationRequest};
use gencache::features::summary::SummaryRequest;
use gencache::resilience::{CircuitBreaker, CircuitBreakerConfig};
use gencache::transport::{HttpGeneratorConfig, HttpTextGenerator};
use gencache::{CacheConfig, FeatureCaches};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let text = HttpTextGenerator::new(
        HttpGeneratorConfig::new("http://127.0.0.1:9/v1", "unreachable")
            .with_timeout(Duration::from_secs(2)),
    )?;
    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::new()
            .with_failure_threshold(2)
            .with_cooldown(Duration::from_secs(60)),
    ));
    let caches = FeatureCaches::with_breaker(Arc::new(text), CacheConfig::default(), breaker.clone())?;

    let summary = caches
        .summaries
        .get_or_generate_entry(&SummaryRequest::new(
            "bio-101-3",
            "Mitosis",
            "Mitosis splits one cell into two. It has four phases. Prophase comes first.",
        ))
        .await?;
    println!("summary ({}): {}", summary.origin(), summary.artifact().summary);
    for point in &summary.artifact().key_points {
        println!("  - {}", point);
    }

    let plan = caches
        .pacing
        .get_or_generate_entry(&PacingRequest::new("learner-7", "biology", 6, 18, 14).with_target_days(21))
        .await?;
    println!(
        "pacing ({}): {} lessons/week, ~{} days left",
        plan.origin(),
        plan.artifact().lessons_per_week,
        plan.artifact().estimated_days_remaining
    );

    println!("breaker open: {}", breaker.snapshot().is_open());

    let request = RecommendationRequest::new(
        "learner-7",
        vec![
            LessonRef::new("bio-1", "Cells", "Biology"),
            LessonRef::new("chem-1", "Atoms", "Chemistry"),
            LessonRef::new("bio-2", "Mitosis", "Biology"),
        ],
        2,
    )
    .with_completed(["bio-1"])
    .with_interests(["biology"]);
    let recs = caches.recommendations.get_or_generate_entry(&request).await?;
    println!("recommendations ({}):", recs.origin());
    for item in &recs.artifact().items {
        println!("  {} - {}", item.title, item.reason);
    }

    println!("cached artifacts: {}", caches.total_size());
    Ok(())
}
