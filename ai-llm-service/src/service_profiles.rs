//! Shared LLM service with two profiles: `generation` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Provider clients are built eagerly so a bad config fails at startup.
//! - Generation calls are bounded by the profile timeout and a caller token.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{LlmServiceProfiles, SamplingConfig};
//! use ai_llm_service::config::default_config::{config_embedding_from_env, config_generation_from_env};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svc = Arc::new(LlmServiceProfiles::new(
//!     config_generation_from_env()?,
//!     config_embedding_from_env()?,
//!     Some(10),
//! )?);
//!
//! let cancel = CancellationToken::new();
//! let txt = svc.generate("What is Article 1 about?", &SamplingConfig::default(), &cancel).await?;
//! let emb = svc.embed("Article 1").await?;
//! println!("{txt} / dim={}", emb.len());
//! # Ok(()) }
//! ```

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::{
        llm_model_config::LlmModelConfig, llm_provider::LlmProvider,
        sampling_config::SamplingConfig,
    },
    error_handler::AiLlmError,
    generation::{GenerationBackend, bounded},
    health_service::{HealthService, HealthStatus},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// One ready-to-use provider client.
#[derive(Debug)]
enum LlmClient {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

impl LlmClient {
    fn build(cfg: &LlmModelConfig) -> Result<Self, AiLlmError> {
        Ok(match cfg.provider {
            LlmProvider::Ollama => Self::Ollama(OllamaService::new(cfg.clone())?),
            LlmProvider::OpenAI => Self::OpenAI(OpenAiService::new(cfg.clone())?),
        })
    }
}

/// Generation and embedding clients plus a health prober.
#[derive(Debug)]
pub struct LlmServiceProfiles {
    generation_cfg: LlmModelConfig,
    embedding_cfg: LlmModelConfig,
    generation: LlmClient,
    embedding: LlmClient,
    health: HealthService,
}

impl LlmServiceProfiles {
    /// Builds both clients.
    ///
    /// # Errors
    /// Propagates client construction failures (wrong provider, missing key,
    /// invalid endpoint).
    pub fn new(
        generation: LlmModelConfig,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let generation_client = LlmClient::build(&generation)?;
        let embedding_client = LlmClient::build(&embedding)?;

        info!(
            generation = %format!("{}:{}", generation.provider, generation.model),
            embedding = %format!("{}:{}", embedding.provider, embedding.model),
            "LLM profiles ready"
        );

        Ok(Self {
            generation_cfg: generation,
            embedding_cfg: embedding,
            generation: generation_client,
            embedding: embedding_client,
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Generates text with the generation profile.
    ///
    /// # Errors
    /// [`AiLlmError::Timeout`] once the profile timeout elapses,
    /// [`AiLlmError::Cancelled`] if `cancel` fires, otherwise the provider error.
    pub async fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        cancel: &CancellationToken,
    ) -> Result<String, AiLlmError> {
        debug!(prompt_len = prompt.len(), "generate");
        let timeout = self.generation_cfg.timeout();
        match &self.generation {
            LlmClient::Ollama(cli) => {
                bounded(cli.generate(prompt, sampling), timeout, cancel).await
            }
            LlmClient::OpenAI(cli) => {
                bounded(cli.generate(prompt, None, sampling), timeout, cancel).await
            }
        }
    }

    /// Computes one embedding with the embedding profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match &self.embedding {
            LlmClient::Ollama(cli) => cli.embeddings(input).await,
            LlmClient::OpenAI(cli) => cli.embeddings(input).await,
        }
    }

    /// Probes every distinct profile.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.generation_cfg.clone()];
        if self.embedding_cfg != self.generation_cfg {
            list.push(self.embedding_cfg.clone());
        }
        self.health.check_many(&list).await
    }

    /// Returns `(generation, embedding)` configs.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.generation_cfg, &self.embedding_cfg)
    }
}

impl GenerationBackend for LlmServiceProfiles {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        sampling: &'a SamplingConfig,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, AiLlmError>> {
        Box::pin(LlmServiceProfiles::generate(self, prompt, sampling, cancel))
    }

    fn name(&self) -> &str {
        &self.generation_cfg.model
    }
}
