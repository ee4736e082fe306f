//! Cache policy configuration.

use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Policy knobs for a [`GenerationCache`](super::GenerationCache).
///
/// Defaults favor availability: fallbacks are cached, concurrent misses share one
/// generator call and a generator call is abandoned after 30 seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Store fallback artifacts under their key. When false every lookup for that
    /// request retries the generator until it succeeds.
    pub cache_fallback: bool,
    /// A hit on a fallback entry retries the generator. Success replaces the entry,
    /// failure keeps the cached fallback.
    pub overwrite_fallback_on_success: bool,
    /// Concurrent misses on one key await a single generator call.
    pub coalesce_in_flight: bool,
    /// Upper bound for one generator call. `None` waits forever.
    pub generation_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_fallback: true,
            overwrite_fallback_on_success: false,
            coalesce_in_flight: true,
            generation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// On-disk shape; every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheConfigFile {
    cache_fallback: Option<bool>,
    overwrite_fallback_on_success: Option<bool>,
    coalesce_in_flight: Option<bool>,
    generation_timeout_secs: Option<u64>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_fallback(mut self, enabled: bool) -> Self {
        self.cache_fallback = enabled;
        self
    }

    pub fn with_overwrite_fallback_on_success(mut self, enabled: bool) -> Self {
        self.overwrite_fallback_on_success = enabled;
        self
    }

    pub fn with_coalesce_in_flight(mut self, enabled: bool) -> Self {
        self.coalesce_in_flight = enabled;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Parse a YAML document on top of the defaults.
    ///
    /// ```
    /// use gencache::cache::CacheConfig;
    ///
    /// let cfg = CacheConfig::from_yaml_str("coalesce_in_flight: false\ngeneration_timeout_secs: 5\n").unwrap();
    /// assert!(!cfg.coalesce_in_flight);
    /// assert_eq!(cfg.generation_timeout, Some(std::time::Duration::from_secs(5)));
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: CacheConfigFile = if yaml.trim().is_empty() {
            CacheConfigFile::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        Ok(Self::default().merge(file))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read cache config: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("cache_config"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overridden by `GENCACHE_*` environment variables.
    ///
    /// - `GENCACHE_CACHE_FALLBACK` (bool)
    /// - `GENCACHE_OVERWRITE_FALLBACK` (bool)
    /// - `GENCACHE_COALESCE` (bool)
    /// - `GENCACHE_GENERATION_TIMEOUT_SECS` (`0` disables the timeout)
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("GENCACHE_CACHE_FALLBACK") {
            self.cache_fallback = parse_bool("GENCACHE_CACHE_FALLBACK", &v)?;
        }
        if let Some(v) = var("GENCACHE_OVERWRITE_FALLBACK") {
            self.overwrite_fallback_on_success = parse_bool("GENCACHE_OVERWRITE_FALLBACK", &v)?;
        }
        if let Some(v) = var("GENCACHE_COALESCE") {
            self.coalesce_in_flight = parse_bool("GENCACHE_COALESCE", &v)?;
        }
        if let Some(v) = var("GENCACHE_GENERATION_TIMEOUT_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|_| {
                Error::configuration_with_context(
                    "expected a whole number of seconds",
                    ErrorContext::new()
                        .with_field_path("GENCACHE_GENERATION_TIMEOUT_SECS")
                        .with_details(v.clone()),
                )
            })?;
            self.generation_timeout = timeout_from_secs(secs);
        }
        Ok(self)
    }

    fn merge(mut self, file: CacheConfigFile) -> Self {
        if let Some(v) = file.cache_fallback {
            self.cache_fallback = v;
        }
        if let Some(v) = file.overwrite_fallback_on_success {
            self.overwrite_fallback_on_success = v;
        }
        if let Some(v) = file.coalesce_in_flight {
            self.coalesce_in_flight = v;
        }
        if let Some(secs) = file.generation_timeout_secs {
            self.generation_timeout = timeout_from_secs(secs);
        }
        self
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration_with_context(
            "expected a boolean",
            ErrorContext::new()
                .with_field_path(name)
                .with_details(value.to_string()),
        )),
    }
}
