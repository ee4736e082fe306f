//! Integration tests for GenerationCache lookup, fallback and coalescing behavior

use async_trait::async_trait;
use gencache::cache::{CacheConfig, CacheKey, CacheableRequest, GenerationCache, Generator, Origin};
use gencache::resilience::{CircuitBreaker, CircuitBreakerConfig};
use gencache::{Error, GenerationFailure};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Topic {
    name: String,
    level: u32,
}

impl Topic {
    fn new(name: &str, level: u32) -> Self {
        Self {
            name: name.to_string(),
            level,
        }
    }
}

impl CacheableRequest for Topic {
    fn validate(&self) -> gencache::Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::missing_field("topic", "name"));
        }
        Ok(())
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::builder("topic")
            .field("name", &self.name)
            .field("level", self.level)
            .build()
    }
}

/// Counts calls; optionally slow, optionally failing.
#[derive(Default)]
struct Spy {
    calls: AtomicUsize,
    delay: Duration,
    failing: AtomicBool,
}

impl Spy {
    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    fn failing() -> Arc<Self> {
        let spy = Self::default();
        spy.failing.store(true, Ordering::SeqCst);
        Arc::new(spy)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator<Topic, String> for Spy {
    async fn generate(&self, request: &Topic) -> Result<String, GenerationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationFailure::Unavailable("backend down".to_string()));
        }
        Ok(format!("{} at level {}", request.name, request.level))
    }

    fn name(&self) -> &str {
        "spy"
    }
}

fn cache_with(spy: &Arc<Spy>, config: CacheConfig) -> GenerationCache<Topic, String> {
    GenerationCache::<Topic, String>::builder("topic")
        .shared_generator(spy.clone())
        .fallback(|t: &Topic| format!("Generic notes on {}", t.name))
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let spy = Arc::new(Spy::default());
    let cache = cache_with(&spy, CacheConfig::default());

    let first = cache.get_or_generate(&Topic::new("Mitosis", 1)).await.unwrap();
    let second = cache.get_or_generate(&Topic::new("Mitosis", 1)).await.unwrap();

    assert_eq!(*first, "Mitosis at level 1");
    assert_eq!(first, second);
    assert_eq!(spy.calls(), 1);
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn test_failure_serves_and_caches_fallback() {
    let spy = Spy::failing();
    let cache = cache_with(&spy, CacheConfig::default());
    let topic = Topic::new("Mitosis", 1);

    let entry = cache.get_or_generate_entry(&topic).await.unwrap();
    assert_eq!(entry.origin(), Origin::Fallback);
    assert_eq!(**entry.artifact(), "Generic notes on Mitosis");

    // The cached fallback answers the next lookup without another attempt.
    let again = cache.get_or_generate_entry(&topic).await.unwrap();
    assert!(again.is_fallback());
    assert!(entry.same_artifact(&again));
    assert_eq!(spy.calls(), 1);

    let stats = cache.stats();
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_distinct_options_generate_separately() {
    let spy = Arc::new(Spy::default());
    let cache = cache_with(&spy, CacheConfig::default());

    let easy = cache.get_or_generate(&Topic::new("Mitosis", 1)).await.unwrap();
    let hard = cache.get_or_generate(&Topic::new("Mitosis", 3)).await.unwrap();

    assert_ne!(easy, hard);
    assert_eq!(spy.calls(), 2);
    assert_eq!(cache.size(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_generation() {
    let spy = Spy::slow(Duration::from_millis(100));
    let cache = cache_with(&spy, CacheConfig::default());
    let topic = Topic::new("Mitosis", 1);

    let (a, b) = tokio::join!(cache.get_or_generate(&topic), cache.get_or_generate(&topic));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(spy.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().coalesced, 1);
    assert_eq!(cache.size(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_spawned_callers_share_one_generation() {
    let spy = Spy::slow(Duration::from_millis(100));
    let cache = Arc::new(cache_with(&spy, CacheConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_generate(&Topic::new("Mitosis", 1)).await })
        })
        .collect();
    let results = futures::future::join_all(handles).await;

    let artifacts: Vec<Arc<String>> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(spy.calls(), 1);
    assert!(artifacts.iter().all(|a| Arc::ptr_eq(a, &artifacts[0])));
}

#[tokio::test]
async fn test_concurrent_misses_without_coalescing_race() {
    let spy = Spy::slow(Duration::from_millis(100));
    let cache = cache_with(&spy, CacheConfig::default().with_coalesce_in_flight(false));
    let topic = Topic::new("Mitosis", 1);

    let (a, b) = tokio::join!(cache.get_or_generate(&topic), cache.get_or_generate(&topic));

    assert_eq!(spy.calls(), 2);
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn test_invalidate_forces_regeneration() {
    let spy = Arc::new(Spy::default());
    let cache = cache_with(&spy, CacheConfig::default());
    let topic = Topic::new("Mitosis", 1);

    cache.get_or_generate(&topic).await.unwrap();
    assert!(cache.invalidate(&topic.cache_key()));
    assert!(!cache.invalidate(&topic.cache_key()));
    assert!(!cache.contains(&topic.cache_key()));

    cache.get_or_generate(&topic).await.unwrap();
    assert_eq!(spy.calls(), 2);
    assert_eq!(cache.stats().invalidations, 1);
}

#[tokio::test]
async fn test_regenerate_replaces_fallback_once_backend_recovers() {
    let spy = Spy::failing();
    let cache = cache_with(&spy, CacheConfig::default());
    let topic = Topic::new("Mitosis", 1);

    assert!(cache.get_or_generate_entry(&topic).await.unwrap().is_fallback());

    spy.failing.store(false, Ordering::SeqCst);
    let entry = cache.regenerate(&topic).await.unwrap();
    assert_eq!(entry.origin(), Origin::Generated);
    assert_eq!(**entry.artifact(), "Mitosis at level 1");
}

#[tokio::test]
async fn test_size_and_clear() {
    let spy = Arc::new(Spy::default());
    let cache = cache_with(&spy, CacheConfig::default());

    for level in 1..=4 {
        cache.get_or_generate(&Topic::new("Mitosis", level)).await.unwrap();
    }
    cache.get_or_generate(&Topic::new("Mitosis", 2)).await.unwrap();
    assert_eq!(cache.size(), 4);

    cache.clear();
    assert!(cache.is_empty());

    cache.get_or_generate(&Topic::new("Mitosis", 2)).await.unwrap();
    assert_eq!(spy.calls(), 5);
}

#[tokio::test]
async fn test_slow_generator_times_out_into_fallback() {
    let spy = Spy::slow(Duration::from_secs(5));
    let cache = cache_with(
        &spy,
        CacheConfig::default().with_generation_timeout(Some(Duration::from_millis(50))),
    );

    let entry = cache
        .get_or_generate_entry(&Topic::new("Mitosis", 1))
        .await
        .unwrap();
    assert!(entry.is_fallback());
    assert_eq!(**entry.artifact(), "Generic notes on Mitosis");
}

#[tokio::test]
async fn test_open_breaker_skips_generator() {
    let spy = Spy::failing();
    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::new()
            .with_failure_threshold(1)
            .with_cooldown(Duration::from_secs(60)),
    ));
    let cache = GenerationCache::<Topic, String>::builder("topic")
        .shared_generator(spy.clone())
        .fallback(|t: &Topic| format!("Generic notes on {}", t.name))
        .circuit_breaker(breaker.clone())
        .build()
        .unwrap();

    cache.get_or_generate(&Topic::new("Mitosis", 1)).await.unwrap();
    assert!(breaker.snapshot().is_open());

    let entry = cache
        .get_or_generate_entry(&Topic::new("Meiosis", 1))
        .await
        .unwrap();
    assert!(entry.is_fallback());
    assert_eq!(spy.calls(), 1);
    assert!(cache.breaker_snapshot().is_some_and(|s| s.is_open()));
}

#[tokio::test]
async fn test_fallback_kept_by_default_after_recovery() {
    let spy = Spy::failing();
    let cache = cache_with(&spy, CacheConfig::default());
    let topic = Topic::new("Mitosis", 1);

    cache.get_or_generate(&topic).await.unwrap();
    spy.failing.store(false, Ordering::SeqCst);

    let entry = cache.get_or_generate_entry(&topic).await.unwrap();
    assert!(entry.is_fallback());
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn test_overwrite_policy_upgrades_fallback() {
    let spy = Spy::failing();
    let cache = cache_with(
        &spy,
        CacheConfig::default().with_overwrite_fallback_on_success(true),
    );
    let topic = Topic::new("Mitosis", 1);

    cache.get_or_generate(&topic).await.unwrap();

    // Still failing: the existing fallback is returned unchanged.
    let retried = cache.get_or_generate_entry(&topic).await.unwrap();
    assert!(retried.is_fallback());
    assert_eq!(spy.calls(), 2);

    spy.failing.store(false, Ordering::SeqCst);
    let upgraded = cache.get_or_generate_entry(&topic).await.unwrap();
    assert_eq!(upgraded.origin(), Origin::Generated);
    assert_eq!(spy.calls(), 3);

    // Generated entries are never retried.
    cache.get_or_generate(&topic).await.unwrap();
    assert_eq!(spy.calls(), 3);
    assert_eq!(cache.stats().refreshes, 2);
}

#[tokio::test]
async fn test_uncached_fallback_retries_every_time() {
    let spy = Spy::failing();
    let cache = cache_with(&spy, CacheConfig::default().with_cache_fallback(false));
    let topic = Topic::new("Mitosis", 1);

    assert!(cache.get_or_generate_entry(&topic).await.unwrap().is_fallback());
    assert!(cache.is_empty());

    cache.get_or_generate(&topic).await.unwrap();
    assert_eq!(spy.calls(), 2);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_generation() {
    let spy = Arc::new(Spy::default());
    let cache = cache_with(&spy, CacheConfig::default());

    let err = cache.get_or_generate(&Topic::new("  ", 1)).await.unwrap_err();
    assert!(err.is_invalid_request());
    assert_eq!(spy.calls(), 0);
    assert!(cache.is_empty());
}
