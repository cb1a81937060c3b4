use contextor::{PipelineStage, UsedChunk};
use serde::{Deserialize, Serialize};

/// Request payload for /ask_question.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural language question.
    pub question: String,
    /// Optional override for the number of retrieved excerpts.
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Response payload for /ask_question.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// Model answer, or the apologetic message when `failed`.
    pub answer: String,
    /// Excerpts given to the model, best first.
    pub context: Vec<CtxItem>,
    pub failed: bool,
    /// Step that failed, only when `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
}

#[derive(Debug, Serialize)]
pub struct CtxItem {
    pub source: Option<String>,
    pub distance: f32,
    pub text: String,
}

impl From<UsedChunk> for CtxItem {
    fn from(u: UsedChunk) -> Self {
        Self {
            source: u.source,
            distance: u.distance,
            text: u.text,
        }
    }
}
