//! Reachability probes for the configured LLM backends.
//!
//! - Ollama: `GET {endpoint}/api/tags`, then look for the model name
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth, then look for the model id
//!
//! [`HealthService::check`] never fails; transport and status errors end up in
//! a [`HealthStatus`] with `ok = false` so it can be served from `/health` as-is.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

/// Serializable outcome of one probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u64,
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.to_string(),
            endpoint: cfg.base_url().to_string(),
            model: cfg.model.clone(),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// Probe client shared by all backend configs.
#[derive(Debug)]
pub struct HealthService {
    client: reqwest::Client,
    timeout: Duration,
}

/// Model names advertised by a backend, normalised across providers.
#[derive(Debug, Default)]
struct ModelListing {
    names: Vec<String>,
}

impl ModelListing {
    /// Ollama tags carry a `:latest` suffix when none was given at pull time.
    fn contains(&self, model: &str) -> bool {
        self.names.iter().any(|n| {
            n == model || n.strip_suffix(":latest").is_some_and(|base| base == model)
        })
    }
}

impl HealthService {
    /// Builds the probe client. `timeout_secs` defaults to 10.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Probes one backend. Failures are reported in the returned status.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let started = Instant::now();
        let result = self.list_models(cfg).await;
        let latency = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let status = match result {
            Ok(listing) if listing.contains(&cfg.model) => HealthStatus::new(
                cfg,
                true,
                latency,
                format!("{} is up; model is available", cfg.provider),
            ),
            Ok(_) => HealthStatus::new(
                cfg,
                false,
                latency,
                format!("{} is up, but model `{}` is not installed", cfg.provider, cfg.model),
            ),
            Err(err) => HealthStatus::new(cfg, false, latency, err.to_string()),
        };

        if status.ok {
            info!(provider = %status.provider, model = %status.model, latency_ms = latency, "health probe ok");
        } else {
            warn!(provider = %status.provider, model = %status.model, latency_ms = latency, message = %status.message, "health probe failed");
        }
        status
    }

    /// Probes several backends in order.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    async fn list_models(&self, cfg: &LlmModelConfig) -> Result<ModelListing, AiLlmError> {
        let base = cfg.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(HealthError::InvalidEndpoint(cfg.endpoint.clone()).into());
        }

        let (url, auth) = match cfg.provider {
            LlmProvider::Ollama => (format!("{base}/api/tags"), None),
            LlmProvider::OpenAI => {
                let key = cfg
                    .api_key
                    .as_deref()
                    .ok_or_else(|| HealthError::Decode("missing OpenAI API key".into()))?;
                (format!("{base}/v1/models"), Some(format!("Bearer {key}")))
            }
        };

        debug!(provider = %cfg.provider, "GET {url}");
        let mut req = self.client.get(&url).timeout(cfg.timeout().min(self.timeout));
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HealthError::HttpStatus(HttpError {
                status,
                url,
                snippet: make_snippet(&body),
            })
            .into());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| HealthError::Decode(e.to_string()))?;
        parse_listing(cfg.provider, &body)
    }
}

fn parse_listing(provider: LlmProvider, body: &str) -> Result<ModelListing, AiLlmError> {
    #[derive(Deserialize)]
    struct OllamaTag {
        name: String,
    }
    #[derive(Deserialize)]
    struct OllamaTags {
        #[serde(default)]
        models: Vec<OllamaTag>,
    }
    #[derive(Deserialize)]
    struct OpenAiModel {
        id: String,
    }
    #[derive(Deserialize)]
    struct OpenAiModels {
        data: Vec<OpenAiModel>,
    }

    let names = match provider {
        LlmProvider::Ollama => serde_json::from_str::<OllamaTags>(body)
            .map_err(|e| HealthError::Decode(format!("/api/tags: {e}")))?
            .models
            .into_iter()
            .map(|t| t.name)
            .collect(),
        LlmProvider::OpenAI => serde_json::from_str::<OpenAiModels>(body)
            .map_err(|e| HealthError::Decode(format!("/v1/models: {e}")))?
            .data
            .into_iter()
            .map(|m| m.id)
            .collect(),
    };
    Ok(ModelListing { names })
}
