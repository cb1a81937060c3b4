//! Lightweight Ollama service for text generation and embeddings.
//!
//! This module implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/generate`  : synchronous text generation (`stream=false`)
//! - `POST {endpoint}/api/embeddings`: embeddings retrieval
//!
//! It uses the universal configuration [`LlmModelConfig`] and ensures
//! that the selected provider is [`LlmProvider::Ollama`].
//!
//! # Examples
//!
//! ```no_run
//! use ai_llm_service::{LlmModelConfig, LlmProvider, SamplingConfig};
//! use ai_llm_service::services::ollama_service::OllamaService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LlmModelConfig {
//!     provider: LlmProvider::Ollama,
//!     model: "mistral".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     api_key: None,
//!     max_tokens: Some(256),
//!     timeout_secs: Some(30),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let text = svc.generate("Summarize Article 1.", &SamplingConfig::default()).await?;
//! println!("Generated:\n{}", text);
//! # Ok(()) }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::config::sampling_config::SamplingConfig;
use crate::error_handler::{AiLlmError, ProviderError, ProviderErrorKind, Result};

/// Thin client for Ollama.
///
/// Initialized with a full [`LlmModelConfig`]. Reuses an HTTP client with
/// the config's timeout. Provides:
/// - [`OllamaService::generate`]  : synchronous text generation
/// - [`OllamaService::embeddings`]: embeddings retrieval
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embeddings: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is not http/https
    /// - [`AiLlmError::HttpTransport`] if HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(LlmProvider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let endpoint = cfg.base_url();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        let url_generate = format!("{endpoint}/api/generate");
        let url_embeddings = format!("{endpoint}/api/embeddings");

        Ok(Self {
            client,
            cfg,
            url_generate,
            url_embeddings,
        })
    }

    /// Performs a **non-streaming** generation request via `/api/generate`.
    ///
    /// Mapped options:
    /// - `model`          ← `self.cfg.model`
    /// - `num_predict`    ← `self.cfg.max_tokens`
    /// - `temperature`, `top_k`, `top_p`, `repeat_penalty` ← `sampling`
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] for non-2xx responses (classified by status)
    /// - [`AiLlmError::HttpTransport`] for client/network errors
    /// - `Decode` if the response cannot be parsed
    #[instrument(skip_all, fields(model = %self.cfg.model, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String> {
        let body = GenerateRequest::new(&self.cfg, prompt, sampling);

        debug!("POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(%status, url = %self.url_generate, "Ollama /api/generate returned non-success status");
            return Err(
                ProviderError::from_status(LlmProvider::Ollama, status, &self.url_generate, &text)
                    .into(),
            );
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            AiLlmError::from(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; ensure `stream=false` is used"
                )),
            ))
        })?;

        Ok(out.response)
    }

    /// Retrieves embeddings via `/api/embeddings`.
    ///
    /// # Errors
    /// Same classes as [`OllamaService::generate`].
    #[instrument(skip_all, fields(model = %self.cfg.model, input_len = input.len()))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(%status, url = %self.url_embeddings, "Ollama /api/embeddings returned non-success status");
            return Err(ProviderError::from_status(
                LlmProvider::Ollama,
                status,
                &self.url_embeddings,
                &text,
            )
            .into());
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            AiLlmError::from(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `{{ embedding: number[] }}`"
                )),
            ))
        })?;

        if out.embedding.is_empty() {
            return Err(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::Decode("empty embedding vector".into()),
            )
            .into());
        }

        Ok(out.embedding)
    }
}

/* ==========================
HTTP payloads & options
========================== */

/// Request body for `/api/generate` (non-streaming).
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

impl<'a> GenerateRequest<'a> {
    fn new(cfg: &'a LlmModelConfig, prompt: &'a str, sampling: &SamplingConfig) -> Self {
        Self {
            model: &cfg.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: sampling.temperature,
                top_k: sampling.top_k,
                top_p: sampling.top_p,
                repeat_penalty: sampling.repeat_penalty,
                num_predict: cfg.max_tokens,
            },
        }
    }
}

/// Subset of Ollama `options`.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response body for `/api/generate`; the generated text is in `response`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Request body for `/api/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response body for `/api/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: LlmProvider, endpoint: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider,
            model: "mistral".into(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: Some(64),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn rejects_foreign_provider() {
        let err =
            OllamaService::new(cfg(LlmProvider::OpenAI, "http://localhost:11434")).unwrap_err();
        assert!(matches!(
            err,
            AiLlmError::Provider(ProviderError { kind: ProviderErrorKind::InvalidProvider, .. })
        ));
    }

    #[test]
    fn rejects_endpoint_without_scheme() {
        let err = OllamaService::new(cfg(LlmProvider::Ollama, "localhost:11434")).unwrap_err();
        assert!(matches!(
            err,
            AiLlmError::Provider(ProviderError { kind: ProviderErrorKind::InvalidEndpoint(_), .. })
        ));
    }

    #[test]
    fn generate_request_maps_all_sampling_options() {
        let c = cfg(LlmProvider::Ollama, "http://localhost:11434/");
        let body = GenerateRequest::new(&c, "hi", &SamplingConfig::default());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["top_k"], 50);
        assert_eq!(json["options"]["num_predict"], 64);
        assert!(json["options"]["repeat_penalty"].as_f64().unwrap() > 1.0);
    }

    #[tokio::test]
    async fn unreachable_server_is_classified() {
        // Port 9 (discard) is practically never served on loopback.
        let svc = OllamaService::new(cfg(LlmProvider::Ollama, "http://127.0.0.1:9")).unwrap();
        let err = svc
            .generate("hello", &SamplingConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), crate::FailureKind::Unreachable);
    }
}
