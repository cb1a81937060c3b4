use std::time::Duration;

use crate::config::llm_provider::LlmProvider;

/// Fallback request timeout when a config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for one model on one provider.
///
/// Sampling knobs live in [`SamplingConfig`](crate::SamplingConfig) and are
/// passed per call; this struct only describes *where* and *what* to call.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::Ollama,
///     model: "mistral".to_string(),
///     endpoint: "http://localhost:11434".to_string(),
///     api_key: None,
///     max_tokens: None,
///     timeout_secs: Some(120),
/// };
/// assert_eq!(cfg.timeout().as_secs(), 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"mistral"`, `"gpt-4o-mini"`).
    pub model: String,

    /// Base URL of the provider (local server or remote API).
    pub endpoint: String,

    /// Optional API key for authentication (OpenAI).
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Effective request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Endpoint without trailing slashes, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
