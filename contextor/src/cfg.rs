//! Runtime configuration loaded from environment variables.

use std::str::FromStr;

use ai_llm_service::SamplingConfig;
use rag_store::{ChunkStrategy, ChunkerConfig};

use crate::error::ContextorError;
use crate::prompt::{PromptFormat, PromptPolicy};

/// Knobs for chunking, retrieval, prompting and Q&A logging.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextorConfig {
    /// Excerpts retrieved per question.
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_strategy: ChunkStrategy,
    /// Char budget for the excerpt block; `None` keeps everything retrieved.
    pub max_ctx_chars: Option<usize>,
    pub prompt_format: PromptFormat,
    pub sampling: SamplingConfig,
    /// `jsonl:///path` or `file:///path`; unset disables the Q&A log.
    pub qa_log_url: Option<String>,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            chunk_size: 1000,
            chunk_overlap: 200,
            chunk_strategy: ChunkStrategy::Fixed,
            max_ctx_chars: None,
            prompt_format: PromptFormat::Instruct,
            sampling: SamplingConfig::default(),
            qa_log_url: None,
        }
    }
}

impl ContextorConfig {
    /// Reads `RAG_TOP_K`, `CHUNK_SIZE`, `CHUNK_OVERLAP`, `CHUNK_STRATEGY`,
    /// `MAX_CTX_CHARS`, `PROMPT_FORMAT`, `QA_LOG_URL` and the `LLM_*`
    /// sampling variables. Unset values fall back to [`Default`].
    ///
    /// # Errors
    /// [`ContextorError::Config`] on unparsable values or an invalid
    /// chunk window.
    pub fn from_env() -> Result<Self, ContextorError> {
        let d = Self::default();
        let cfg = Self {
            top_k: parse("RAG_TOP_K")?.unwrap_or(d.top_k),
            chunk_size: parse("CHUNK_SIZE")?.unwrap_or(d.chunk_size),
            chunk_overlap: parse("CHUNK_OVERLAP")?.unwrap_or(d.chunk_overlap),
            chunk_strategy: match env("CHUNK_STRATEGY") {
                Some(v) => v
                    .parse::<ChunkStrategy>()
                    .map_err(|e| ContextorError::Config(e.to_string()))?,
                None => d.chunk_strategy,
            },
            max_ctx_chars: parse("MAX_CTX_CHARS")?,
            prompt_format: parse("PROMPT_FORMAT")?.unwrap_or(d.prompt_format),
            sampling: SamplingConfig::from_env()
                .map_err(|e| ContextorError::Config(e.to_string()))?,
            qa_log_url: env("QA_LOG_URL"),
        };
        cfg.chunker_config()?;
        Ok(cfg)
    }

    pub fn chunker_config(&self) -> Result<ChunkerConfig, ContextorError> {
        ChunkerConfig::new(self.chunk_size, self.chunk_overlap)
            .map_err(|e| ContextorError::Config(e.to_string()))
    }

    pub fn prompt_policy(&self) -> PromptPolicy {
        PromptPolicy {
            format: self.prompt_format,
            max_context_chars: self.max_ctx_chars,
            ..PromptPolicy::default()
        }
    }
}

fn env(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T>(k: &str) -> Result<Option<T>, ContextorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env(k)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ContextorError::Config(format!("{k}=`{v}`: {e}")))
        })
        .transpose()
}
