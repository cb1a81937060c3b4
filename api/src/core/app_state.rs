use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use contextor::AnswerPipeline;
use tokio_util::sync::CancellationToken;

/// Shared state for all HTTP handlers. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnswerPipeline>,
    /// Probed by `/health`; `None` reports no LLM profiles.
    pub llm: Option<Arc<LlmServiceProfiles>>,
    /// Cancelled on shutdown so in-flight generations stop.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<AnswerPipeline>, llm: Option<Arc<LlmServiceProfiles>>) -> Self {
        Self {
            pipeline,
            llm,
            shutdown: CancellationToken::new(),
        }
    }
}
