//! Embedding provider backed by the shared LLM service profiles.

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use futures::future::BoxFuture;

use crate::{EmbeddingsProvider, RagError};

/// Embeds through the `embedding` profile of [`LlmServiceProfiles`]
/// (Ollama `/api/embeddings` or OpenAI `/v1/embeddings`).
#[derive(Clone, Debug)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Self {
        Self { svc }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        Box::pin(async move {
            self.svc
                .embed(text)
                .await
                .map_err(|e| RagError::Embedding(e.to_string()))
        })
    }
}
