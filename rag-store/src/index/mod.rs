//! Vector index over embedded chunks.
//!
//! [`Index`] is the seam the answer pipeline talks to. Two implementations:
//! [`InMemoryIndex`] (process-local, exact search) and [`QdrantIndex`].
//!
//! Batch preparation is shared: ids are assigned, empty chunks and
//! conflicting duplicates rejected, and embeddings computed *before* any
//! write, so a failed batch never leaves partial state behind.

use std::collections::HashMap;

use futures::future::BoxFuture;
use sha2::{Digest, Sha256};

use crate::embed::{EmbeddingsProvider, embed_all};
use crate::errors::RagError;
use crate::record::{AddReport, Chunk, IndexEntry, QueryResult};

mod memory;
mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Stores chunks with embeddings and answers top-K similarity queries.
pub trait Index: Send + Sync {
    /// Embeds and stores `chunks`.
    ///
    /// # Errors
    /// [`RagError::IndexWrite`] wrapping the cause; nothing from the batch is
    /// stored in that case.
    fn add<'a>(&'a self, chunks: Vec<Chunk>) -> BoxFuture<'a, Result<AddReport, RagError>>;

    /// Returns up to `k` hits ordered by ascending distance.
    ///
    /// # Errors
    /// [`RagError::IndexQuery`] wrapping the cause.
    fn query<'a>(
        &'a self,
        text: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<QueryResult, RagError>>;

    /// Number of stored entries.
    fn len<'a>(&'a self) -> BoxFuture<'a, Result<usize, RagError>>;

    /// Backend label for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Deterministic id: SHA-256 over source, start offset and the full text.
pub fn chunk_id(chunk: &Chunk) -> String {
    let mut h = Sha256::new();
    h.update(chunk.source().unwrap_or("").as_bytes());
    h.update([0u8]);
    h.update(chunk.start.to_le_bytes());
    h.update([0u8]);
    h.update(chunk.text.as_bytes());
    format!("{:x}", h.finalize())
}

/// Chunks ready for embedding, deduplicated within the batch.
pub(crate) struct PreparedBatch {
    /// Unique chunks with ids assigned, input order.
    pub chunks: Vec<(String, Chunk)>,
    /// Every input id, input order.
    pub ids: Vec<String>,
    /// Repeats of an id already present earlier in the same batch.
    pub repeats: usize,
}

/// Assigns ids and rejects empty chunks or conflicting duplicates in the batch.
pub(crate) fn prepare(chunks: Vec<Chunk>) -> Result<PreparedBatch, RagError> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(chunks.len());
    let mut out: Vec<(String, Chunk)> = Vec::with_capacity(chunks.len());
    let mut ids = Vec::with_capacity(chunks.len());
    let mut repeats = 0;

    for mut chunk in chunks {
        let id = match chunk.id.clone() {
            Some(id) if !id.trim().is_empty() => id,
            _ => chunk_id(&chunk),
        };
        if chunk.text.trim().is_empty() {
            return Err(RagError::EmptyChunk { id });
        }
        chunk.id = Some(id.clone());
        ids.push(id.clone());

        if let Some(&pos) = seen.get(&id) {
            if out[pos].1.text != chunk.text {
                return Err(RagError::DuplicateId { id });
            }
            repeats += 1;
            continue;
        }
        seen.insert(id.clone(), out.len());
        out.push((id, chunk));
    }

    Ok(PreparedBatch {
        chunks: out,
        ids,
        repeats,
    })
}

/// Embeds prepared chunks and checks they share one dimension.
pub(crate) async fn embed_entries(
    chunks: Vec<(String, Chunk)>,
    provider: &dyn EmbeddingsProvider,
    concurrency: usize,
    want_dim: Option<usize>,
) -> Result<Vec<IndexEntry>, RagError> {
    let texts: Vec<&str> = chunks.iter().map(|(_, c)| c.text.as_str()).collect();
    let vectors = embed_all(provider, &texts, concurrency).await?;

    let mut dim = want_dim;
    let mut out = Vec::with_capacity(chunks.len());
    for ((id, chunk), vector) in chunks.into_iter().zip(vectors) {
        match dim {
            Some(want) if vector.len() != want => {
                return Err(RagError::VectorSizeMismatch {
                    got: vector.len(),
                    want,
                });
            }
            None => dim = Some(vector.len()),
            _ => {}
        }
        out.push(IndexEntry { id, chunk, vector });
    }
    Ok(out)
}

/// Embeds a query string, rejecting a dimension that disagrees with the index.
pub(crate) async fn embed_query(
    provider: &dyn EmbeddingsProvider,
    text: &str,
    want_dim: Option<usize>,
) -> Result<Vec<f32>, RagError> {
    let v = provider.embed(text).await?;
    if v.is_empty() {
        return Err(RagError::Embedding("provider returned an empty vector".into()));
    }
    if let Some(want) = want_dim.filter(|w| *w != v.len()) {
        return Err(RagError::VectorSizeMismatch { got: v.len(), want });
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;

    #[test]
    fn ids_are_deterministic_and_position_sensitive() {
        let a = chunk("Article 1", 100, 10).unwrap().remove(0);
        let mut b = a.clone();
        assert_eq!(chunk_id(&a), chunk_id(&b));
        b.start = 7;
        assert_ne!(chunk_id(&a), chunk_id(&b));
        assert_eq!(chunk_id(&a).len(), 64);
    }

    #[test]
    fn whitespace_chunk_is_rejected() {
        let mut c = chunk("x", 10, 2).unwrap().remove(0);
        c.text = " \n\t".into();
        assert!(matches!(prepare(vec![c]), Err(RagError::EmptyChunk { .. })));
    }

    #[test]
    fn in_batch_duplicates_are_collapsed_or_rejected() {
        let a = chunk("same", 10, 2).unwrap().remove(0);
        let batch = prepare(vec![a.clone(), a.clone()]).unwrap();
        assert_eq!(batch.chunks.len(), 1);
        assert_eq!(batch.repeats, 1);
        assert_eq!(batch.ids.len(), 2);

        let mut b = a.clone();
        b.id = Some("fixed".into());
        let mut c = a;
        c.id = Some("fixed".into());
        c.text = "other".into();
        assert!(matches!(prepare(vec![b, c]), Err(RagError::DuplicateId { id }) if id == "fixed"));
    }
}
