use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "quiz.count", "GENCACHE_BASE_URL")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "quiz_request", "cache_config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors a caller of the crate can observe.
///
/// Generation problems are not in this list: they are [`GenerationFailure`]s and the
/// cache absorbs them by serving a fallback artifact.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {message}{}", format_context(.context))]
    InvalidRequest {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new invalid-request error with structured context
    pub fn invalid_request_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context,
        }
    }

    /// Shorthand for a missing or blank required request field.
    pub fn missing_field(source: &str, field: &str) -> Self {
        Self::invalid_request_with_context(
            format!("`{}` must not be empty", field),
            ErrorContext::new()
                .with_field_path(format!("{}.{}", source, field))
                .with_source(source),
        )
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidRequest { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest { .. })
    }
}

/// Why the external generator could not produce an artifact.
///
/// Every variant is recovered locally by the cache through the fallback generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote error: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response does not match schema: {}", .0.join("; "))]
    SchemaMismatch(Vec<String>),

    #[error("response rejected: {0}")]
    Rejected(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("circuit breaker open ({remaining_ms} ms remaining)")]
    CircuitOpen { remaining_ms: u64 },

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

impl GenerationFailure {
    /// Short stable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::Transport(_) => "transport",
            GenerationFailure::Remote { .. } => "remote",
            GenerationFailure::Malformed(_) => "malformed",
            GenerationFailure::SchemaMismatch(_) => "schema_mismatch",
            GenerationFailure::Rejected(_) => "rejected",
            GenerationFailure::Timeout(_) => "timeout",
            GenerationFailure::CircuitOpen { .. } => "circuit_open",
            GenerationFailure::Unavailable(_) => "unavailable",
        }
    }

    /// Whether the backend itself is unhealthy, as opposed to having answered with
    /// content that did not parse or pass checks.
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            GenerationFailure::Transport(_)
                | GenerationFailure::Remote { .. }
                | GenerationFailure::Timeout(_)
                | GenerationFailure::Unavailable(_)
        )
    }
}
