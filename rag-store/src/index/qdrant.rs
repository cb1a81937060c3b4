//! Qdrant-backed index.
//!
//! Point ids are UUIDv5 of the chunk id, so re-ingesting the same chunk maps
//! to the same point. The collection is created on first `add`, sized from
//! the first embedding. Writes are serialized so the existing-id check and
//! the upsert that follows it see the same collection state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use services::uuid::stable_uuid;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Index, embed_entries, embed_query, prepare};
use crate::config::{DistanceKind, RagConfig};
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::qdrant_facade::QdrantFacade;
use crate::record::{AddReport, Chunk, QueryResult, RagHit};

pub struct QdrantIndex {
    facade: QdrantFacade,
    provider: Arc<dyn EmbeddingsProvider>,
    distance: DistanceKind,
    concurrency: usize,
    /// Held across check, embed and upsert in `add`.
    write_lock: Mutex<()>,
}

impl QdrantIndex {
    pub fn new(cfg: &RagConfig, provider: Arc<dyn EmbeddingsProvider>) -> Result<Self, RagError> {
        Ok(Self {
            facade: QdrantFacade::new(cfg)?,
            provider,
            distance: cfg.distance,
            concurrency: cfg.embedding_concurrency.max(1),
            write_lock: Mutex::new(()),
        })
    }

    fn point_id(chunk_id: &str) -> String {
        stable_uuid(chunk_id).to_string()
    }

    async fn add_inner(&self, chunks: Vec<Chunk>) -> Result<AddReport, RagError> {
        let batch = prepare(chunks)?;
        let mut skipped = batch.repeats;

        let stored: HashMap<String, String> = if self.facade.exists().await? {
            let point_ids = batch.chunks.iter().map(|(id, _)| Self::point_id(id)).collect();
            self.facade
                .get_payloads(point_ids)
                .await?
                .into_iter()
                .filter_map(|p| {
                    let id = p.get("chunk_id")?.as_str()?.to_string();
                    let text = p.get("text")?.as_str()?.to_string();
                    Some((id, text))
                })
                .collect()
        } else {
            HashMap::new()
        };

        let (fresh, already) = split_stored(batch.chunks, &stored)?;
        skipped += already;

        let entries = embed_entries(fresh, self.provider.as_ref(), self.concurrency, None).await?;
        if let Some(first) = entries.first() {
            self.facade.ensure_collection(first.vector.len()).await?;
        }

        let points = entries
            .into_iter()
            .map(|e| {
                let point_id = Self::point_id(&e.id);
                let payload = json!({
                    "chunk_id": e.id,
                    "text": e.chunk.text,
                    "order": e.chunk.order,
                    "start": e.chunk.start,
                    "metadata": e.chunk.metadata,
                });
                (point_id, e.vector, payload)
            })
            .collect();
        let added = self.facade.upsert_all(points).await?;

        info!(collection = %self.facade.collection(), added, skipped, "qdrant index updated");
        Ok(AddReport {
            added,
            skipped,
            ids: batch.ids,
        })
    }

    async fn query_inner(&self, text: &str, k: usize) -> Result<QueryResult, RagError> {
        if k == 0 || !self.facade.exists().await? || self.facade.count().await? == 0 {
            return Ok(QueryResult::default());
        }

        let qv = embed_query(self.provider.as_ref(), text, None).await?;
        let raw = self.facade.search(qv, k as u64).await?;

        let mut hits: Vec<RagHit> = raw
            .into_iter()
            .map(|(score, payload)| {
                hit_from_payload(self.distance.from_qdrant_score(score), payload)
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        debug!(k, returned = hits.len(), "qdrant query");
        Ok(QueryResult { hits })
    }
}

/// Separates chunks not yet stored from identical ones already present.
/// A stored id with different text is a conflict.
fn split_stored(
    chunks: Vec<(String, Chunk)>,
    stored: &HashMap<String, String>,
) -> Result<(Vec<(String, Chunk)>, usize), RagError> {
    let mut fresh = Vec::with_capacity(chunks.len());
    let mut skipped = 0;
    for (id, chunk) in chunks {
        match stored.get(&id) {
            Some(text) if *text == chunk.text => skipped += 1,
            Some(_) => return Err(RagError::DuplicateId { id }),
            None => fresh.push((id, chunk)),
        }
    }
    Ok((fresh, skipped))
}

fn hit_from_payload(distance: f32, payload: Value) -> RagHit {
    let str_field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let metadata: BTreeMap<String, String> = payload
        .get("metadata")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(k, v)| {
                    let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default();

    RagHit {
        id: str_field("chunk_id"),
        text: str_field("text"),
        metadata,
        distance,
    }
}

impl Index for QdrantIndex {
    fn add<'a>(&'a self, chunks: Vec<Chunk>) -> BoxFuture<'a, Result<AddReport, RagError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            self.add_inner(chunks).await.map_err(RagError::into_write)
        })
    }

    fn query<'a>(
        &'a self,
        text: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<QueryResult, RagError>> {
        Box::pin(async move { self.query_inner(text, k).await.map_err(RagError::into_query) })
    }

    fn len<'a>(&'a self) -> BoxFuture<'a, Result<usize, RagError>> {
        Box::pin(async move {
            if !self.facade.exists().await? {
                return Ok(0);
            }
            Ok(self.facade.count().await? as usize)
        })
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}
