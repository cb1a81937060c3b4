//! Default LLM configs loaded from environment variables.
//!
//! Two roles are resolved independently so generation and embeddings can live
//! on different providers:
//!
//! - **Generation** → answers questions from assembled prompts
//! - **Embedding**  → vectors for chunks and queries
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`        = generation provider (`ollama` | `openai`, default `ollama`)
//! - `EMBEDDING_KIND`  = embedding provider (defaults to `LLM_KIND`)
//! - `LLM_MAX_TOKENS`  = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = generation timeout (default 120)
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (default `http://localhost:11434`)
//! - `OLLAMA_MODEL`                = generation model (default `mistral`)
//! - `EMBEDDING_MODEL`             = embedding model (default `nomic-embed-text`)
//!
//! OpenAI-specific:
//! - `OPENAI_API_KEY`  = API key (mandatory when OpenAI is selected)
//! - `OPENAI_BASE_URL` = endpoint (default `https://api.openai.com`)
//! - `OPENAI_MODEL`    = generation model (default `gpt-4o-mini`)
//! - `EMBEDDING_MODEL` = embedding model (default `text-embedding-3-small`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt_u32, env_opt_u64, env_or, must_env,
        validate_http_endpoint,
    },
};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Resolves the Ollama endpoint from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
/// 3. `http://localhost:11434`
///
/// # Errors
///
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
/// - [`ConfigError::InvalidFormat`] if `OLLAMA_URL` has no http/https scheme
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            validate_http_endpoint("OLLAMA_URL", &url)?;
            return Ok(url);
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Ok(DEFAULT_OLLAMA_URL.to_string())
}

fn openai_endpoint() -> Result<String, AiLlmError> {
    let url = env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_URL);
    validate_http_endpoint("OPENAI_BASE_URL", &url)?;
    Ok(url)
}

fn provider_from_env(var: &'static str, default: LlmProvider) -> Result<LlmProvider, AiLlmError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.parse::<LlmProvider>()?),
        _ => Ok(default),
    }
}

/// Constructs the **generation** config selected by `LLM_KIND`.
///
/// # Defaults
/// - `timeout_secs = Some(120)` (local models on CPU are slow)
pub fn config_generation_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let provider = provider_from_env("LLM_KIND", LlmProvider::Ollama)?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;
    let timeout_secs = Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(120));

    let cfg = match provider {
        LlmProvider::Ollama => LlmModelConfig {
            provider,
            model: env_or("OLLAMA_MODEL", "mistral"),
            endpoint: ollama_endpoint()?,
            api_key: None,
            max_tokens,
            timeout_secs,
        },
        LlmProvider::OpenAI => LlmModelConfig {
            provider,
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            endpoint: openai_endpoint()?,
            api_key: Some(must_env("OPENAI_API_KEY")?),
            max_tokens,
            timeout_secs,
        },
    };
    ensure_model(&cfg)?;
    Ok(cfg)
}

/// Constructs the **embedding** config selected by `EMBEDDING_KIND`
/// (falls back to `LLM_KIND`).
///
/// # Defaults
/// - `max_tokens = None`
/// - `timeout_secs = Some(30)`
pub fn config_embedding_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let fallback = provider_from_env("LLM_KIND", LlmProvider::Ollama)?;
    let provider = provider_from_env("EMBEDDING_KIND", fallback)?;

    let cfg = match provider {
        LlmProvider::Ollama => LlmModelConfig {
            provider,
            model: env_or("EMBEDDING_MODEL", "nomic-embed-text"),
            endpoint: ollama_endpoint()?,
            api_key: None,
            max_tokens: None,
            timeout_secs: Some(30),
        },
        LlmProvider::OpenAI => LlmModelConfig {
            provider,
            model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            endpoint: openai_endpoint()?,
            api_key: Some(must_env("OPENAI_API_KEY")?),
            max_tokens: None,
            timeout_secs: Some(30),
        },
    };
    ensure_model(&cfg)?;
    Ok(cfg)
}

fn ensure_model(cfg: &LlmModelConfig) -> Result<(), AiLlmError> {
    if cfg.model.trim().is_empty() {
        return Err(ConfigError::EmptyModel.into());
    }
    Ok(())
}
