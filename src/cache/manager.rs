//! Generation cache manager.

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::key::CacheKey;
use super::traits::{CacheableRequest, FallbackGenerator, Generator};
use crate::error::GenerationFailure;
use crate::resilience::{CircuitBreaker, CircuitBreakerSnapshot};
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub generated: u64,
    pub fallbacks: u64,
    /// Lookups that joined a generation already in flight for their key.
    pub coalesced: u64,
    /// Hits on fallback entries that retried the generator.
    pub refreshes: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    generated: AtomicU64,
    fallbacks: AtomicU64,
    coalesced: AtomicU64,
    refreshes: AtomicU64,
    invalidations: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

type InFlight<A> = Arc<OnceCell<CacheEntry<A>>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lookup-or-generate cache with degraded-mode fallback.
///
/// A miss calls the external [`Generator`]. If that fails for any reason (error,
/// unparsable output, timeout, open circuit breaker) the [`FallbackGenerator`]
/// produces a generic artifact instead. Callers never see a generation failure;
/// the only error [`get_or_generate`](Self::get_or_generate) returns is
/// [`Error::InvalidRequest`].
///
/// Entries live until [`invalidate`](Self::invalidate) or [`clear`](Self::clear);
/// there is no expiry and no eviction.
///
/// ```rust,no_run
/// # use gencache::cache::{GenerationCache, CacheConfig};
/// # use gencache::features::quiz::{QuizFeature, QuizRequest, Difficulty};
/// # use gencache::features::{PromptedGenerator, FeatureFallback};
/// # async fn demo(text: std::sync::Arc<dyn gencache::transport::TextGenerator>) -> gencache::Result<()> {
/// let cache = GenerationCache::builder("quiz")
///     .generator(PromptedGenerator::<QuizFeature>::new(text)?)
///     .fallback(FeatureFallback::<QuizFeature>::new())
///     .config(CacheConfig::default())
///     .build()?;
///
/// let request = QuizRequest::new("Mitosis", "Cell Division", Difficulty::Easy, 5);
/// let quiz = cache.get_or_generate(&request).await?;
/// assert_eq!(quiz.questions.len(), 5);
/// # Ok(())
/// # }
/// ```
pub struct GenerationCache<R, A>
where
    R: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    name: String,
    config: CacheConfig,
    generator: Arc<dyn Generator<R, A>>,
    fallback: Arc<dyn FallbackGenerator<R, A>>,
    breaker: Option<Arc<CircuitBreaker>>,
    entries: RwLock<HashMap<CacheKey, CacheEntry<A>>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight<A>>>,
    stats: AtomicStats,
}

impl<R, A> GenerationCache<R, A>
where
    R: CacheableRequest + 'static,
    A: Send + Sync + 'static,
{
    pub fn builder(name: impl Into<String>) -> GenerationCacheBuilder<R, A> {
        GenerationCacheBuilder::new(name)
    }

    /// Cache with default policy and no circuit breaker.
    pub fn new(
        name: impl Into<String>,
        generator: Arc<dyn Generator<R, A>>,
        fallback: Arc<dyn FallbackGenerator<R, A>>,
    ) -> Self {
        Self::from_parts(name.into(), CacheConfig::default(), generator, fallback, None)
    }

    fn from_parts(
        name: String,
        config: CacheConfig,
        generator: Arc<dyn Generator<R, A>>,
        fallback: Arc<dyn FallbackGenerator<R, A>>,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Self {
        Self {
            name,
            config,
            generator,
            fallback,
            breaker,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            stats: AtomicStats::default(),
        }
    }

    pub async fn get_or_generate(&self, request: &R) -> Result<Arc<A>> {
        Ok(self.get_or_generate_entry(request).await?.into_artifact())
    }

    /// Like [`get_or_generate`](Self::get_or_generate) but exposes whether the
    /// artifact is a fallback, e.g. to offer a "try again" action.
    pub async fn get_or_generate_entry(&self, request: &R) -> Result<CacheEntry<A>> {
        request.validate()?;
        let key = request.cache_key();

        let cached = self.peek(&key);
        match &cached {
            Some(entry) if !self.wants_refresh(entry) => {
                AtomicStats::bump(&self.stats.hits);
                debug!(cache = %self.name, key = %key, origin = %entry.origin(), "cache hit");
                return Ok(entry.clone());
            }
            Some(_) => {
                AtomicStats::bump(&self.stats.refreshes);
                debug!(cache = %self.name, key = %key, "retrying generator for cached fallback");
            }
            None => {
                AtomicStats::bump(&self.stats.misses);
                debug!(cache = %self.name, key = %key, "cache miss");
            }
        }

        let entry = if self.config.coalesce_in_flight {
            self.generate_coalesced(request, &key).await
        } else {
            self.generate_and_store(request, &key, cached).await
        };
        Ok(entry)
    }

    /// Drop whatever is cached for `request` and look it up again.
    pub async fn regenerate(&self, request: &R) -> Result<CacheEntry<A>> {
        request.validate()?;
        self.invalidate(&request.cache_key());
        self.get_or_generate_entry(request).await
    }

    async fn generate_coalesced(&self, request: &R, key: &CacheKey) -> CacheEntry<A> {
        let cell = {
            let mut in_flight = lock(&self.in_flight);
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };

        let mut leader = false;
        let entry = cell
            .get_or_init(|| {
                leader = true;
                let cell = Arc::clone(&cell);
                async move {
                    // The key may have been stored between our lookup and joining the cell.
                    let entry = match self.peek(key) {
                        Some(entry) if !self.wants_refresh(&entry) => entry,
                        cached => self.generate_and_store(request, key, cached).await,
                    };
                    // Unregister before the cell is filled, so later callers start fresh.
                    {
                        let mut in_flight = lock(&self.in_flight);
                        if in_flight.get(key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                            in_flight.remove(key);
                        }
                    }
                    entry
                }
            })
            .await
            .clone();

        if !leader {
            AtomicStats::bump(&self.stats.coalesced);
            debug!(cache = %self.name, key = %key, "joined in-flight generation");
        }

        entry
    }

    async fn generate_and_store(
        &self,
        request: &R,
        key: &CacheKey,
        cached: Option<CacheEntry<A>>,
    ) -> CacheEntry<A> {
        match self.try_generate(request).await {
            Ok(artifact) => {
                AtomicStats::bump(&self.stats.generated);
                let entry = CacheEntry::generated(artifact);
                self.store(key, entry.clone());
                info!(
                    cache = %self.name,
                    key = %key,
                    replaced_fallback = cached.is_some(),
                    "stored generated artifact"
                );
                entry
            }
            Err(failure) => {
                warn!(
                    cache = %self.name,
                    key = %key,
                    kind = failure.kind(),
                    error = %failure,
                    "generation failed, serving fallback"
                );
                // A failed retry keeps the fallback that is already cached.
                if let Some(previous) = cached {
                    return previous;
                }
                AtomicStats::bump(&self.stats.fallbacks);
                let entry = CacheEntry::fallback(self.fallback.fallback(request));
                if self.config.cache_fallback {
                    self.store(key, entry.clone());
                }
                entry
            }
        }
    }

    async fn try_generate(&self, request: &R) -> std::result::Result<A, GenerationFailure> {
        if let Some(breaker) = &self.breaker {
            breaker.allow()?;
        }

        let outcome = match self.config.generation_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.generator.generate(request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(GenerationFailure::Timeout(limit)),
                }
            }
            None => self.generator.generate(request).await,
        };

        // Content the backend answered with but we could not use says nothing about its health.
        if let Some(breaker) = &self.breaker {
            match &outcome {
                Ok(_) => breaker.on_success(),
                Err(failure) if failure.is_backend_fault() => breaker.on_failure(),
                Err(_) => {}
            }
        }
        outcome
    }

    fn wants_refresh(&self, entry: &CacheEntry<A>) -> bool {
        self.config.overwrite_fallback_on_success && entry.is_fallback()
    }

    fn store(&self, key: &CacheKey, entry: CacheEntry<A>) {
        write(&self.entries).insert(key.clone(), entry);
    }

    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<A>> {
        read(&self.entries).get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        read(&self.entries).contains_key(key)
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = write(&self.entries).remove(key).is_some();
        if removed {
            AtomicStats::bump(&self.stats.invalidations);
            debug!(cache = %self.name, key = %key, "invalidated");
        }
        removed
    }

    /// Empty the store. Generations already in flight still store their result.
    pub fn clear(&self) {
        let dropped = {
            let mut entries = write(&self.entries);
            let count = entries.len();
            entries.clear();
            count
        };
        info!(cache = %self.name, dropped, "cache cleared");
    }

    pub fn size(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn breaker_snapshot(&self) -> Option<CircuitBreakerSnapshot> {
        self.breaker.as_ref().map(|b| b.snapshot())
    }
}

impl<R, A> std::fmt::Debug for GenerationCache<R, A>
where
    R: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("name", &self.name)
            .field("generator", &self.generator.name())
            .field("entries", &read(&self.entries).len())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`GenerationCache`].
pub struct GenerationCacheBuilder<R, A>
where
    R: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    name: String,
    config: CacheConfig,
    generator: Option<Arc<dyn Generator<R, A>>>,
    fallback: Option<Arc<dyn FallbackGenerator<R, A>>>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<R, A> GenerationCacheBuilder<R, A>
where
    R: CacheableRequest + 'static,
    A: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CacheConfig::default(),
            generator: None,
            fallback: None,
            breaker: None,
        }
    }

    pub fn generator(self, generator: impl Generator<R, A> + 'static) -> Self {
        self.shared_generator(Arc::new(generator))
    }

    pub fn shared_generator(mut self, generator: Arc<dyn Generator<R, A>>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn fallback(mut self, fallback: impl FallbackGenerator<R, A> + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Share one breaker between caches that talk to the same backend.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn build(self) -> Result<GenerationCache<R, A>> {
        let missing = |what: &str| {
            Error::configuration_with_context(
                format!("{} is required", what),
                ErrorContext::new()
                    .with_field_path(format!("{}.{}", self.name, what))
                    .with_source("generation_cache_builder"),
            )
        };
        let generator = self.generator.clone().ok_or_else(|| missing("generator"))?;
        let fallback = self.fallback.clone().ok_or_else(|| missing("fallback"))?;
        Ok(GenerationCache::from_parts(
            self.name,
            self.config,
            generator,
            fallback,
            self.breaker,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Echo(String);

    impl CacheableRequest for Echo {
        fn cache_key(&self) -> CacheKey {
            CacheKey::builder("echo").field("text", &self.0).build()
        }
    }

    #[derive(Default)]
    struct Upper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator<Echo, String> for Upper {
        async fn generate(&self, request: &Echo) -> std::result::Result<String, GenerationFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(request.0.to_uppercase())
        }
    }

    #[test]
    fn test_builder_requires_generator_and_fallback() {
        let err = GenerationCache::<Echo, String>::builder("echo")
            .fallback(|r: &Echo| r.0.clone())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("generator is required"));

        let err = GenerationCache::<Echo, String>::builder("echo")
            .generator(Upper::default())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("fallback is required"));
    }

    #[tokio::test]
    async fn test_hit_returns_shared_artifact() {
        let generator = Arc::new(Upper::default());
        let cache = GenerationCache::<Echo, String>::new(
            "echo",
            generator.clone(),
            Arc::new(|r: &Echo| r.0.clone()),
        );

        let first = cache.get_or_generate(&Echo("hi".into())).await.unwrap();
        let second = cache.get_or_generate(&Echo("hi".into())).await.unwrap();
        assert_eq!(*first, "HI");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.generated), (1, 1, 1));
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_flight_cell_is_gone_once_filled() {
        let generator = Arc::new(Upper::default());
        let cache = GenerationCache::<Echo, String>::new(
            "echo",
            generator.clone(),
            Arc::new(|r: &Echo| r.0.clone()),
        );
        let request = Echo("hi".into());

        cache.get_or_generate(&request).await.unwrap();
        assert!(lock(&cache.in_flight).is_empty());

        // A regenerate straight after must not join the finished cell.
        let entry = cache.regenerate(&request).await.unwrap();
        assert!(!entry.is_fallback());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert!(cache.contains(&request.cache_key()));
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[test]
    fn test_stats_hit_ratio_empty() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_debug_lists_name_and_size() {
        let cache = GenerationCache::<Echo, String>::new(
            "echo",
            Arc::new(Upper::default()),
            Arc::new(|r: &Echo| r.0.clone()),
        );
        let shown = format!("{:?}", cache);
        assert!(shown.contains("\"echo\""));
        assert!(shown.contains("entries: 0"));
    }
}
