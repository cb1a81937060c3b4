//! Unified error handling for `ai-llm-service`.
//!
//! This module exposes a single top-level error type [`AiLlmError`] for the whole
//! library, and groups domain-specific errors in nested enums (e.g., [`ConfigError`],
//! [`HealthError`], [`ProviderError`]). Small helpers for reading/validating
//! environment variables are provided and return the unified [`Result<T>`] alias.
//!
//! Callers that only need to know *why* a backend call failed use
//! [`AiLlmError::failure_kind`], which collapses every variant into
//! [`FailureKind`].
//!
//! All messages include the prefix `[AI LLM Service]` to simplify attribution in logs.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `ai-llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Health-check/connectivity/decoding errors.
    #[error(transparent)]
    Health(#[from] HealthError),

    /// Provider-level failures (HTTP status, decode, missing key).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the in-flight request.
    #[error("[AI LLM Service] request cancelled")]
    Cancelled,
}

/// Coarse classification of a backend failure.
///
/// The three provider-facing kinds (`Unreachable`, `RateLimited`,
/// `MalformedRequest`) are what callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS failure, timeout, or upstream 502/503/504.
    Unreachable,
    /// HTTP 429 or quota exhaustion.
    RateLimited,
    /// The provider rejected the request shape (400/404/413/422).
    MalformedRequest,
    /// Cancelled by the caller.
    Cancelled,
    /// Local configuration problem.
    Misconfigured,
    /// Anything else (unexpected status, undecodable payload).
    Other,
}

impl AiLlmError {
    /// Classifies this error for retry/UX decisions.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AiLlmError::Provider(p) => p.kind.failure_kind(),
            AiLlmError::HttpTransport(e) if e.is_connect() || e.is_timeout() => {
                FailureKind::Unreachable
            }
            AiLlmError::HttpTransport(e) if e.is_builder() => FailureKind::MalformedRequest,
            AiLlmError::HttpTransport(_) => FailureKind::Other,
            AiLlmError::Timeout(_) => FailureKind::Unreachable,
            AiLlmError::Cancelled => FailureKind::Cancelled,
            AiLlmError::Config(_) => FailureKind::Misconfigured,
            AiLlmError::Health(_) => FailureKind::Other,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND` / `EMBEDDING_KIND`.
    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `temperature`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("[AI LLM Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* HTTP status payload                                                       */
/* ------------------------------------------------------------------------- */

/// Non-success HTTP response captured for diagnostics.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Numeric HTTP status code.
    pub status: StatusCode,
    /// Request URL.
    pub url: String,
    /// Short snippet of the response body (trimmed).
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

/// Trims a response body to a log-friendly single-line snippet.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let flat: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = flat.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(MAX).collect();
        s.push('…');
        s
    }
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// A failure attributed to a specific provider.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider}: {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }

    /// Maps a non-success HTTP response onto the matching kind.
    pub fn from_status(provider: LlmProvider, status: StatusCode, url: &str, body: &str) -> Self {
        let http = HttpError {
            status,
            url: url.to_string(),
            snippet: make_snippet(body),
        };
        let kind = match status.as_u16() {
            429 => ProviderErrorKind::RateLimited(http),
            // OpenAI reports exhausted billing quota on some routes as 403.
            403 if body.contains("insufficient_quota") => ProviderErrorKind::RateLimited(http),
            400 | 404 | 413 | 422 => ProviderErrorKind::MalformedRequest(http),
            502..=504 => ProviderErrorKind::Unavailable(http),
            _ => ProviderErrorKind::HttpStatus(http),
        };
        Self { provider, kind }
    }
}

/// What went wrong when talking to a provider.
#[non_exhaustive]
#[derive(Debug)]
pub enum ProviderErrorKind {
    /// The config targets a different provider than this client.
    InvalidProvider,
    /// The provider requires an API key and none was configured.
    MissingApiKey,
    /// Endpoint is empty or not http/https.
    InvalidEndpoint(String),
    /// Upstream gateway reported the backend as unavailable.
    Unavailable(HttpError),
    /// Rate limit or quota exceeded.
    RateLimited(HttpError),
    /// Request rejected as malformed (bad params, unknown model, too large).
    MalformedRequest(HttpError),
    /// Any other non-success status.
    HttpStatus(HttpError),
    /// Response body could not be decoded.
    Decode(String),
    /// Chat completion returned no usable choice.
    EmptyChoices,
}

impl ProviderErrorKind {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Unavailable(_) => FailureKind::Unreachable,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::MalformedRequest(_) => FailureKind::MalformedRequest,
            Self::InvalidProvider | Self::MissingApiKey | Self::InvalidEndpoint(_) => {
                FailureKind::Misconfigured
            }
            Self::HttpStatus(_) | Self::Decode(_) | Self::EmptyChoices => FailureKind::Other,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProvider => f.write_str("invalid provider for this client"),
            Self::MissingApiKey => f.write_str("missing API key"),
            Self::InvalidEndpoint(e) => write!(f, "invalid endpoint: {e}"),
            Self::Unavailable(h) => write!(f, "backend unavailable ({h})"),
            Self::RateLimited(h) => write!(f, "rate limited or quota exceeded ({h})"),
            Self::MalformedRequest(h) => write!(f, "malformed request ({h})"),
            Self::HttpStatus(h) => write!(f, "unexpected status ({h})"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::EmptyChoices => f.write_str("response contained no choices"),
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Health errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for provider health checks.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HealthError {
    /// The endpoint is empty or does not start with http/https.
    #[error("[AI LLM Service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Upstream returned a non-successful HTTP status.
    #[error("[AI LLM Service] health probe failed: {0}")]
    HttpStatus(HttpError),

    /// Probe could not be built or decoded.
    #[error("[AI LLM Service] decode error: {0}")]
    Decode(String),
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Returns the variable if set and non-empty, otherwise `default`.
pub fn env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse::<u32>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        _ => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse::<u64>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        _ => Ok(None),
    }
}

/// Parses an optional `f32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_f32(name: &'static str) -> Result<Option<f32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse::<f32>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected floating point number",
            })
        }),
        _ => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start with
/// a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
///
/// # Errors
/// Returns [`ConfigError::OutOfRange`] if `value` is outside `[min, max]` or not finite.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_err(status: u16, body: &str) -> AiLlmError {
        ProviderError::from_status(
            LlmProvider::OpenAI,
            StatusCode::from_u16(status).unwrap(),
            "http://x/v1/chat/completions",
            body,
        )
        .into()
    }

    #[test]
    fn status_codes_map_to_failure_kinds() {
        assert_eq!(provider_err(429, "").failure_kind(), FailureKind::RateLimited);
        assert_eq!(
            provider_err(403, r#"{"error":{"code":"insufficient_quota"}}"#).failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(provider_err(400, "").failure_kind(), FailureKind::MalformedRequest);
        assert_eq!(provider_err(404, "").failure_kind(), FailureKind::MalformedRequest);
        assert_eq!(provider_err(503, "").failure_kind(), FailureKind::Unreachable);
        assert_eq!(provider_err(500, "").failure_kind(), FailureKind::Other);
    }

    #[test]
    fn timeout_and_cancel_are_classified() {
        assert_eq!(
            AiLlmError::Timeout(Duration::from_secs(1)).failure_kind(),
            FailureKind::Unreachable
        );
        assert_eq!(AiLlmError::Cancelled.failure_kind(), FailureKind::Cancelled);
    }

    #[test]
    fn snippet_is_bounded_and_single_line() {
        let body = format!("line1\nline2\t{}", "x".repeat(1000));
        let s = make_snippet(&body);
        assert!(!s.contains('\n'));
        assert!(s.chars().count() <= 241);
    }

    #[test]
    fn endpoint_validation() {
        assert!(validate_http_endpoint("OLLAMA_URL", "http://localhost:11434").is_ok());
        assert!(validate_http_endpoint("OLLAMA_URL", "localhost:11434").is_err());
    }
}
