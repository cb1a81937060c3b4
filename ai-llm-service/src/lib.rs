//! Shared LLM access layer: generation and embedding backends (Ollama, OpenAI),
//! sampling configuration, unified errors, health checks and a tracing layer.
//!
//! Construct [`LlmServiceProfiles`] once at process start, wrap it in `Arc`
//! and hand clones to dependents. The generation side is consumed through the
//! [`GenerationBackend`] trait so callers can swap in other implementations.

pub mod config;
pub mod error_handler;
pub mod generation;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use config::sampling_config::SamplingConfig;
pub use error_handler::{AiLlmError, FailureKind};
pub use generation::GenerationBackend;
pub use health_service::{HealthService, HealthStatus};
pub use service_profiles::LlmServiceProfiles;
