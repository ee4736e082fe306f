//! Text generation backends.
//!
//! The cache never talks to a model directly. Feature adapters turn a request into a
//! [`Prompt`] and hand it to a [`TextGenerator`]; this module provides the HTTP
//! implementation and an offline stand-in.

pub mod http;

pub use http::{HttpGeneratorConfig, HttpTextGenerator};

use crate::error::GenerationFailure;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A two-part chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Something that turns a prompt into raw model output.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, GenerationFailure>;

    fn name(&self) -> &str;
}

/// Generator used when no backend is configured. Every call fails, so every
/// artifact comes from the fallback generators.
#[derive(Debug, Clone)]
pub struct OfflineGenerator {
    reason: String,
}

impl OfflineGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self::new("no generation backend configured")
    }
}

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn complete(&self, _: &Prompt) -> std::result::Result<String, GenerationFailure> {
        Err(GenerationFailure::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// HTTP generator when an API key can be found, otherwise [`OfflineGenerator`].
pub fn from_env() -> Result<Arc<dyn TextGenerator>> {
    let config = HttpGeneratorConfig::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!(
            "No API key found (keyring service `gencache` or GENCACHE_API_KEY); \
             running in degraded mode with fallback artifacts only"
        );
        return Ok(Arc::new(OfflineGenerator::default()));
    }
    Ok(Arc::new(HttpTextGenerator::new(config)?))
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
