//! In-memory index with exact nearest-neighbour search.
//!
//! Entries live in a `Vec` guarded by a `tokio::sync::RwLock`, so queries see
//! either all or none of a concurrent batch. Ties in distance resolve by
//! insertion order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Index, embed_entries, embed_query, prepare};
use crate::config::DistanceKind;
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::record::{AddReport, Chunk, IndexEntry, QueryResult, RagHit};

#[derive(Debug, Default)]
struct State {
    entries: Vec<IndexEntry>,
    by_id: HashMap<String, usize>,
    dim: Option<usize>,
}

impl State {
    /// `Ok(true)` if `id` is already stored with the same text.
    fn check_existing(&self, id: &str, text: &str) -> Result<bool, RagError> {
        match self.by_id.get(id) {
            Some(&pos) if self.entries[pos].chunk.text == text => Ok(true),
            Some(_) => Err(RagError::DuplicateId { id: id.to_string() }),
            None => Ok(false),
        }
    }
}

pub struct InMemoryIndex {
    state: RwLock<State>,
    provider: Arc<dyn EmbeddingsProvider>,
    distance: DistanceKind,
    concurrency: usize,
}

impl InMemoryIndex {
    pub fn new(
        provider: Arc<dyn EmbeddingsProvider>,
        distance: DistanceKind,
        concurrency: usize,
    ) -> Self {
        Self {
            state: RwLock::new(State::default()),
            provider,
            distance,
            concurrency: concurrency.max(1),
        }
    }

    async fn add_inner(&self, chunks: Vec<Chunk>) -> Result<AddReport, RagError> {
        let batch = prepare(chunks)?;
        let mut skipped = batch.repeats;

        let (fresh, dim) = {
            let state = self.state.read().await;
            let mut fresh = Vec::with_capacity(batch.chunks.len());
            for (id, chunk) in batch.chunks {
                if state.check_existing(&id, &chunk.text)? {
                    skipped += 1;
                } else {
                    fresh.push((id, chunk));
                }
            }
            (fresh, state.dim)
        };

        let entries = embed_entries(fresh, self.provider.as_ref(), self.concurrency, dim).await?;

        let mut state = self.state.write().await;
        // Re-validate: another batch may have landed while we were embedding.
        let mut to_insert = Vec::with_capacity(entries.len());
        for entry in entries {
            if state.check_existing(&entry.id, &entry.chunk.text)? {
                skipped += 1;
                continue;
            }
            if let Some(want) = state.dim.filter(|w| *w != entry.vector.len()) {
                return Err(RagError::VectorSizeMismatch {
                    got: entry.vector.len(),
                    want,
                });
            }
            to_insert.push(entry);
        }

        let added = to_insert.len();
        for entry in to_insert {
            state.dim.get_or_insert(entry.vector.len());
            let pos = state.entries.len();
            state.by_id.insert(entry.id.clone(), pos);
            state.entries.push(entry);
        }

        info!(added, skipped, total = state.entries.len(), "in-memory index updated");
        Ok(AddReport {
            added,
            skipped,
            ids: batch.ids,
        })
    }

    async fn query_inner(&self, text: &str, k: usize) -> Result<QueryResult, RagError> {
        if k == 0 {
            return Ok(QueryResult::default());
        }
        let dim = {
            let state = self.state.read().await;
            if state.entries.is_empty() {
                debug!("query on empty index");
                return Ok(QueryResult::default());
            }
            state.dim
        };

        let qv = embed_query(self.provider.as_ref(), text, dim).await?;

        let state = self.state.read().await;
        let mut hits: Vec<RagHit> = state
            .entries
            .iter()
            .map(|e| RagHit {
                id: e.id.clone(),
                text: e.chunk.text.clone(),
                metadata: e.chunk.metadata.clone(),
                distance: self.distance.distance(&qv, &e.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        debug!(k, returned = hits.len(), "in-memory query");
        Ok(QueryResult { hits })
    }
}

impl Index for InMemoryIndex {
    fn add<'a>(&'a self, chunks: Vec<Chunk>) -> BoxFuture<'a, Result<AddReport, RagError>> {
        Box::pin(async move { self.add_inner(chunks).await.map_err(RagError::into_write) })
    }

    fn query<'a>(
        &'a self,
        text: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<QueryResult, RagError>> {
        Box::pin(async move { self.query_inner(text, k).await.map_err(RagError::into_query) })
    }

    fn len<'a>(&'a self) -> BoxFuture<'a, Result<usize, RagError>> {
        Box::pin(async move { Ok(self.state.read().await.entries.len()) })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Bag-of-bytes embedder: texts sharing characters land close together.
    struct ByteHistogram {
        fail: AtomicBool,
        dim: usize,
    }

    impl ByteHistogram {
        fn new(dim: usize) -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(false),
                dim,
            })
        }
    }

    impl EmbeddingsProvider for ByteHistogram {
        fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
            Box::pin(async move {
                if self.fail.load(Ordering::SeqCst) {
                    return Err(RagError::Embedding("backend down".into()));
                }
                let mut v = vec![0.0f32; self.dim];
                for b in text.bytes() {
                    v[b as usize % self.dim] += 1.0;
                }
                Ok(v)
            })
        }
    }

    fn index(p: Arc<ByteHistogram>) -> InMemoryIndex {
        InMemoryIndex::new(p, DistanceKind::Cosine, 2)
    }

    #[tokio::test]
    async fn empty_index_returns_empty_result() {
        let p = ByteHistogram::new(16);
        p.fail.store(true, Ordering::SeqCst);
        let idx = index(p);
        assert!(idx.query("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fewer_entries_than_k_returns_all_sorted() {
        let idx = index(ByteHistogram::new(64));
        let mut chunks = chunk("aaaa", 10, 2).unwrap();
        chunks.extend(chunk("bbbb", 10, 2).unwrap());
        chunks.extend(chunk("abab", 10, 2).unwrap());
        let report = idx.add(chunks).await.unwrap();
        assert_eq!(report.added, 3);

        let res = idx.query("aaab", 10).await.unwrap();
        assert_eq!(res.len(), 3);
        assert!(res.hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(res.hits[0].text, "aaaa");
        assert_eq!(res.hits[2].text, "bbbb");
        assert_eq!(idx.query("aaab", 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn re_adding_identical_chunks_is_skipped() {
        let idx = index(ByteHistogram::new(32));
        let chunks = chunk("Article 1. Kazakhstan is a unitary state.", 20, 5).unwrap();
        let first = idx.add(chunks.clone()).await.unwrap();
        let second = idx.add(chunks).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, first.added);
        assert_eq!(first.ids, second.ids);
        assert_eq!(idx.len().await.unwrap(), first.added);
    }

    #[tokio::test]
    async fn conflicting_id_fails_the_whole_batch() {
        let idx = index(ByteHistogram::new(32));
        let mut a = chunk("first", 10, 2).unwrap().remove(0);
        a.id = Some("art-1".into());
        idx.add(vec![a.clone()]).await.unwrap();

        let fresh = chunk("unrelated fresh text", 40, 2).unwrap().remove(0);
        let mut clash = a;
        clash.text = "changed".into();
        let err = idx.add(vec![fresh, clash]).await.unwrap_err();
        assert!(matches!(err, RagError::IndexWrite(_)));
        assert!(matches!(err.cause(), RagError::DuplicateId { .. }));
        assert_eq!(idx.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_is_an_index_error_and_writes_nothing() {
        let p = ByteHistogram::new(8);
        let idx = index(p.clone());
        p.fail.store(true, Ordering::SeqCst);
        let err = idx.add(chunk("some text", 4, 1).unwrap()).await.unwrap_err();
        assert!(matches!(err.cause(), RagError::Embedding(_)));
        assert_eq!(idx.len().await.unwrap(), 0);

        p.fail.store(false, Ordering::SeqCst);
        idx.add(chunk("some text", 4, 1).unwrap()).await.unwrap();
        p.fail.store(true, Ordering::SeqCst);
        let err = idx.query("text", 3).await.unwrap_err();
        assert!(matches!(err, RagError::IndexQuery(_)));
    }

    #[tokio::test]
    async fn interleaved_adds_and_queries_are_consistent() {
        let idx = Arc::new(index(ByteHistogram::new(32)));
        let mut tasks = Vec::new();
        for i in 0..8 {
            let idx = idx.clone();
            tasks.push(tokio::spawn(async move {
                let text = format!("document number {i} about article {i}");
                idx.add(chunk(&text, 12, 4).unwrap()).await.unwrap();
                idx.query("article", 3).await.unwrap()
            }));
        }
        for t in tasks {
            let res = t.await.unwrap();
            assert!(!res.is_empty() && res.len() <= 3);
        }
        let total = idx.len().await.unwrap();
        let unique = idx.query("article", usize::MAX).await.unwrap().len();
        assert_eq!(total, unique);
    }
}
