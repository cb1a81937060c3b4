//! Retrieval storage for constitution Q&A: chunking, embedding, vector index
//! and the append-only question/answer log.
//!
//! The crate is flat: each concern has its own module, and [`open_index`]
//! picks the index backend from [`RagConfig`].

mod chunker;
mod config;
mod embed;
mod errors;
mod index;
mod qa_log;
mod qdrant_facade;
mod record;

use std::sync::Arc;

pub use chunker::{
    ChunkStrategy, Chunker, ChunkerConfig, FixedWindowChunker, Piece, RecursiveChunker, chunk,
};
pub use config::{DistanceKind, IndexBackend, RagConfig};
pub use embed::{EmbeddingsProvider, LlmEmbedder, embed_all};
pub use errors::RagError;
pub use index::{InMemoryIndex, Index, QdrantIndex, chunk_id};
pub use qa_log::{JsonlQaLog, QaLog, QaLogSink};
pub use record::{
    AddReport, Chunk, IndexEntry, META_CHUNK_INDEX, META_SOURCE, META_START_CHAR, QaRecord,
    QueryResult, RagHit,
};

use tracing::info;

/// Builds the configured index backend around `provider`.
///
/// # Errors
/// `RagError::Config` for an invalid configuration or an unusable Qdrant URL.
pub fn open_index(
    cfg: &RagConfig,
    provider: Arc<dyn EmbeddingsProvider>,
) -> Result<Arc<dyn Index>, RagError> {
    cfg.validate()?;
    let index: Arc<dyn Index> = match cfg.backend {
        IndexBackend::Memory => Arc::new(InMemoryIndex::new(
            provider,
            cfg.distance,
            cfg.embedding_concurrency,
        )),
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(cfg, provider)?),
    };
    info!(backend = index.backend(), distance = ?cfg.distance, "index opened");
    Ok(index)
}
