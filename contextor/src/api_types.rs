//! Public API types re-used by external crates (e.g., the HTTP API layer).

use ai_llm_service::SamplingConfig;
use rag_store::RagHit;
use serde::{Deserialize, Serialize};

/// Per-question overrides. `None` means "use the pipeline default".
///
/// # Example
/// ```
/// use contextor::AskOptions;
/// let opts = AskOptions { top_k: Some(3), ..AskOptions::default() };
/// assert_eq!(opts.top_k, Some(3));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AskOptions {
    /// Excerpts to retrieve; falls back to `RAG_TOP_K`.
    pub top_k: Option<usize>,
    /// Sampling for this question only.
    pub sampling: Option<SamplingConfig>,
}

/// A context excerpt that was fed to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsedChunk {
    pub id: String,
    pub text: String,
    pub source: Option<String>,
    /// Smaller is closer.
    pub distance: f32,
}

impl From<RagHit> for UsedChunk {
    fn from(hit: RagHit) -> Self {
        let source = hit.source().map(str::to_string);
        Self {
            id: hit.id,
            text: hit.text,
            source,
            distance: hit.distance,
        }
    }
}

/// Final answer together with the exact context passed to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    pub context: Vec<UsedChunk>,
}
