//! Learning features built on the generation cache.
//!
//! Each feature is a small adapter: a request type that derives its own cache key, an
//! artifact type with a JSON schema, a prompt, a semantic check and a fallback. The
//! generic pieces here turn any [`Feature`] into a [`Generator`] and a
//! [`FallbackGenerator`] for [`GenerationCache`].
//!
//! | Feature | Request | Artifact |
//! |---------|---------|----------|
//! | [`summary`] | [`SummaryRequest`](summary::SummaryRequest) | [`LessonSummary`](summary::LessonSummary) |
//! | [`quiz`] | [`QuizRequest`](quiz::QuizRequest) | [`Quiz`](quiz::Quiz) |
//! | [`pacing`] | [`PacingRequest`](pacing::PacingRequest) | [`PacingPlan`](pacing::PacingPlan) |
//! | [`recommendations`] | [`RecommendationRequest`](recommendations::RecommendationRequest) | [`RecommendationList`](recommendations::RecommendationList) |

pub mod pacing;
pub mod quiz;
pub mod recommendations;
pub mod summary;

use crate::cache::{CacheConfig, CacheableRequest, FallbackGenerator, GenerationCache, Generator};
use crate::error::GenerationFailure;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::structured::{parse_artifact, ResponseSchema};
use crate::transport::{Prompt, TextGenerator};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Confidence carried by every fallback artifact.
pub const FALLBACK_CONFIDENCE: f32 = 0.0;

/// Confidence assumed when the model omits the field.
pub const DEFAULT_GENERATED_CONFIDENCE: f32 = 0.75;

pub(crate) fn default_confidence() -> f32 {
    DEFAULT_GENERATED_CONFIDENCE
}

pub(crate) fn check_confidence(confidence: f32) -> std::result::Result<(), String> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(format!("confidence {} is outside 0..=1", confidence))
    }
}

pub(crate) fn require_text(source: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::missing_field(source, field));
    }
    Ok(())
}

pub(crate) fn out_of_range(source: &str, field: &str, details: String) -> Error {
    Error::invalid_request_with_context(
        format!("`{}` is out of range", field),
        ErrorContext::new()
            .with_field_path(format!("{}.{}", source, field))
            .with_details(details)
            .with_source(source),
    )
}

/// One AI-assisted feature.
pub trait Feature: Send + Sync + 'static {
    type Request: CacheableRequest + 'static;
    type Artifact: Serialize + DeserializeOwned + schemars::JsonSchema + Send + Sync + 'static;

    /// Cache name and log label.
    const NAME: &'static str;

    fn prompt(request: &Self::Request) -> Prompt;

    /// Generic artifact built from the request alone. Must not fail.
    fn fallback(request: &Self::Request) -> Self::Artifact;

    /// Semantic checks the schema cannot express (counts, index ranges, ids).
    fn check(_request: &Self::Request, _artifact: &Self::Artifact) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// [`Generator`] that prompts a [`TextGenerator`] and parses the answer as `F::Artifact`.
pub struct PromptedGenerator<F: Feature> {
    text: Arc<dyn TextGenerator>,
    schema: ResponseSchema,
    _feature: PhantomData<fn() -> F>,
}

impl<F: Feature> PromptedGenerator<F> {
    pub fn new(text: Arc<dyn TextGenerator>) -> Result<Self> {
        Ok(Self {
            text,
            schema: ResponseSchema::for_type::<F::Artifact>()?,
            _feature: PhantomData,
        })
    }

    pub fn schema(&self) -> &ResponseSchema {
        &self.schema
    }

    /// Feature prompt plus the output contract.
    pub fn render(&self, request: &F::Request) -> Prompt {
        let mut prompt = F::prompt(request);
        prompt.system.push_str(
            "\n\nRespond with a single JSON object and nothing else. \
             It must validate against this JSON schema:\n",
        );
        prompt.system.push_str(&self.schema.to_pretty_string());
        prompt
    }
}

#[async_trait]
impl<F: Feature> Generator<F::Request, F::Artifact> for PromptedGenerator<F> {
    async fn generate(
        &self,
        request: &F::Request,
    ) -> std::result::Result<F::Artifact, GenerationFailure> {
        let prompt = self.render(request);
        let raw = self.text.complete(&prompt).await?;
        let artifact: F::Artifact = parse_artifact(&raw, &self.schema)?;
        F::check(request, &artifact).map_err(GenerationFailure::Rejected)?;
        Ok(artifact)
    }

    fn name(&self) -> &str {
        F::NAME
    }
}

/// [`FallbackGenerator`] backed by [`Feature::fallback`].
pub struct FeatureFallback<F>(PhantomData<fn() -> F>);

impl<F> FeatureFallback<F> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<F> Default for FeatureFallback<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Feature> FallbackGenerator<F::Request, F::Artifact> for FeatureFallback<F> {
    fn fallback(&self, request: &F::Request) -> F::Artifact {
        F::fallback(request)
    }
}

/// Cache for one feature on top of `text`.
pub fn feature_cache<F: Feature>(
    text: Arc<dyn TextGenerator>,
    config: CacheConfig,
    breaker: Option<Arc<CircuitBreaker>>,
) -> Result<GenerationCache<F::Request, F::Artifact>> {
    let mut builder = GenerationCache::<F::Request, F::Artifact>::builder(F::NAME)
        .generator(PromptedGenerator::<F>::new(text)?)
        .fallback(FeatureFallback::<F>::new())
        .config(config);
    if let Some(breaker) = breaker {
        builder = builder.circuit_breaker(breaker);
    }
    builder.build()
}

/// One cache per feature area, sharing a text generator and, optionally, a breaker.
pub struct FeatureCaches {
    pub summaries: GenerationCache<summary::SummaryRequest, summary::LessonSummary>,
    pub quizzes: GenerationCache<quiz::QuizRequest, quiz::Quiz>,
    pub pacing: GenerationCache<pacing::PacingRequest, pacing::PacingPlan>,
    pub recommendations:
        GenerationCache<recommendations::RecommendationRequest, recommendations::RecommendationList>,
}

impl FeatureCaches {
    pub fn new(text: Arc<dyn TextGenerator>, config: CacheConfig) -> Result<Self> {
        Self::build(text, config, None)
    }

    /// All four caches trip and recover together, since they share one backend.
    pub fn with_breaker(
        text: Arc<dyn TextGenerator>,
        config: CacheConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self> {
        Self::build(text, config, Some(breaker))
    }

    /// Generator, cache policy and breaker from `GENCACHE_*` variables.
    pub fn from_env() -> Result<Self> {
        let text = crate::transport::from_env()?;
        let config = CacheConfig::from_env()?;
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from_env()?));
        Self::with_breaker(text, config, breaker)
    }

    fn build(
        text: Arc<dyn TextGenerator>,
        config: CacheConfig,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Result<Self> {
        Ok(Self {
            summaries: feature_cache::<summary::SummaryFeature>(
                Arc::clone(&text),
                config.clone(),
                breaker.clone(),
            )?,
            quizzes: feature_cache::<quiz::QuizFeature>(
                Arc::clone(&text),
                config.clone(),
                breaker.clone(),
            )?,
            pacing: feature_cache::<pacing::PacingFeature>(
                Arc::clone(&text),
                config.clone(),
                breaker.clone(),
            )?,
            recommendations: feature_cache::<recommendations::RecommendationFeature>(
                text, config, breaker,
            )?,
        })
    }

    pub fn clear_all(&self) {
        self.summaries.clear();
        self.quizzes.clear();
        self.pacing.clear();
        self.recommendations.clear();
    }

    pub fn total_size(&self) -> usize {
        self.summaries.size() + self.quizzes.size() + self.pacing.size() + self.recommendations.size()
    }
}
