//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
///
/// Index failures are tagged by direction: anything raised while adding is
/// wrapped in [`RagError::IndexWrite`], anything raised while querying in
/// [`RagError::IndexQuery`]. The wrapped cause stays reachable via
/// [`RagError::cause`].
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("[RAG Store] io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("[RAG Store] parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid or unsupported configuration.
    #[error("[RAG Store] config error: {0}")]
    Config(String),

    /// The embedding backend failed or returned nothing usable.
    #[error("[RAG Store] embedding failed: {0}")]
    Embedding(String),

    /// Chunk text is empty or whitespace only.
    #[error("[RAG Store] chunk {id} has no text")]
    EmptyChunk { id: String },

    /// Same id already stored (or repeated in the batch) with different text.
    #[error("[RAG Store] duplicate chunk id {id} with different content")]
    DuplicateId { id: String },

    /// Mismatch in vector dimensionality.
    #[error("[RAG Store] vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Qdrant client errors (wrapped).
    #[error("[RAG Store] qdrant error: {0}")]
    Qdrant(String),

    /// The question/answer log could not be written.
    #[error("[RAG Store] qa log error: {0}")]
    QaLog(String),

    /// Adding chunks failed; nothing from the batch was stored.
    #[error("[RAG Store] index write failed: {0}")]
    IndexWrite(#[source] Box<RagError>),

    /// Querying the index failed.
    #[error("[RAG Store] index query failed: {0}")]
    IndexQuery(#[source] Box<RagError>),
}

impl RagError {
    /// Tags `self` as a write failure (idempotent).
    pub fn into_write(self) -> Self {
        match self {
            e @ RagError::IndexWrite(_) => e,
            e => RagError::IndexWrite(Box::new(e)),
        }
    }

    /// Tags `self` as a query failure (idempotent).
    pub fn into_query(self) -> Self {
        match self {
            e @ RagError::IndexQuery(_) => e,
            e => RagError::IndexQuery(Box::new(e)),
        }
    }

    /// Innermost error behind any `IndexWrite` / `IndexQuery` wrapping.
    pub fn cause(&self) -> &RagError {
        match self {
            RagError::IndexWrite(inner) | RagError::IndexQuery(inner) => inner.cause(),
            other => other,
        }
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(e: qdrant_client::QdrantError) -> Self {
        RagError::Qdrant(e.to_string())
    }
}
