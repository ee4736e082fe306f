use super::{Prompt, TextGenerator, TransportError};
use crate::error::GenerationFailure;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use serde_json::json;
use std::env;
use std::time::Duration;
use url::Url;

const KEYRING_SERVICE: &str = "gencache";
const KEYRING_USER: &str = "api-key";
const MAX_ERROR_BODY: usize = 512;

/// Settings for [`HttpTextGenerator`].
#[derive(Clone, PartialEq)]
pub struct HttpGeneratorConfig {
    /// Base of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
}

impl std::fmt::Debug for HttpGeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGeneratorConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.4,
        }
    }
}

impl HttpGeneratorConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Minimal production-friendly defaults (env-overridable):
    /// - `GENCACHE_BASE_URL`
    /// - `GENCACHE_MODEL`
    /// - `GENCACHE_HTTP_TIMEOUT_SECS`
    /// - `GENCACHE_TEMPERATURE`
    /// - API key: OS keyring first, then `GENCACHE_API_KEY`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            base_url: env::var("GENCACHE_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("GENCACHE_MODEL").unwrap_or(defaults.model),
            api_key: Self::get_api_key(),
            timeout: env::var("GENCACHE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: env::var("GENCACHE_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .unwrap_or(defaults.temperature),
        };
        config.validate()?;
        Ok(config)
    }

    fn get_api_key() -> Option<String> {
        // 1. Try Keyring
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, KEYRING_USER) {
            if let Ok(key) = entry.get_password() {
                return Some(key);
            }
        }

        // 2. Try Environment Variable
        env::var("GENCACHE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("GENCACHE_BASE_URL")
                    .with_details(self.base_url.clone()),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "base URL must be http or https",
                ErrorContext::new()
                    .with_field_path("GENCACHE_BASE_URL")
                    .with_details(self.base_url.clone()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "model must not be empty",
                ErrorContext::new().with_field_path("GENCACHE_MODEL"),
            ));
        }
        Ok(())
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat-completions client for OpenAI-compatible endpoints, asking for JSON output.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: HttpGeneratorConfig,
}

impl HttpTextGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(TransportError::Http)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpGeneratorConfig {
        &self.config
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, GenerationFailure> {
        let mut request = self
            .client
            .post(self.config.completions_url())
            .json(&self.request_body(prompt));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(GenerationFailure::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationFailure::Malformed(format!("response body: {}", e)))?;

        body.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationFailure::Malformed("missing choices[0].message.content".to_string())
            })
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_trims_slash() {
        let cfg = HttpGeneratorConfig::new("http://localhost:4010/v1/", "m");
        assert_eq!(cfg.completions_url(), "http://localhost:4010/v1/chat/completions");
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(HttpGeneratorConfig::new("not a url", "m").validate().is_err());
        assert!(HttpGeneratorConfig::new("ftp://host/v1", "m").validate().is_err());
        assert!(HttpGeneratorConfig::new("https://host/v1", " ").validate().is_err());
        assert!(HttpGeneratorConfig::new("https://host/v1", "m").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let cfg = HttpGeneratorConfig::default().with_api_key("sk-secret");
        let shown = format!("{:?}", cfg);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_request_body_asks_for_json() {
        let generator = HttpTextGenerator::new(HttpGeneratorConfig::default()).unwrap();
        let body = generator.request_body(&Prompt::new("be terse", "hello"));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["model"], "gpt-4o-mini");
    }
}
