//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! Everything the Qdrant-backed index needs goes through [`QdrantFacade`]:
//! lazy collection creation, batched upserts with rollback, point lookup by
//! id, counting and similarity search. Payloads come back as JSON so the rest
//! of the crate never touches `qdrant::Value`.

use std::collections::HashMap;

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder,
    PointId, PointStruct, PointsIdsList, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{DistanceKind, RagConfig};
use crate::errors::RagError;

pub struct QdrantFacade {
    client: Qdrant,
    collection: String,
    distance: DistanceKind,
    upsert_batch: usize,
    exact: bool,
}

impl QdrantFacade {
    /// Builds the client. No network traffic happens here.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
            upsert_batch: cfg.upsert_batch.max(1),
            exact: cfg.exact_search,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn exists(&self) -> Result<bool, RagError> {
        Ok(self.client.collection_exists(&self.collection).await?)
    }

    /// Creates the collection with `dim`-sized vectors unless it already exists.
    pub async fn ensure_collection(&self, dim: usize) -> Result<(), RagError> {
        if self.exists().await? {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        let distance = match self.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, distance)),
            )
            .await?;

        info!(collection = %self.collection, dim, distance = ?self.distance, "collection created");
        Ok(())
    }

    /// Upserts in batches. If a later batch fails, points written by earlier
    /// batches of this call are deleted again before the error is returned.
    pub async fn upsert_all(
        &self,
        points: Vec<(String, Vec<f32>, Value)>,
    ) -> Result<usize, RagError> {
        let total = points.len();
        let mut written: Vec<PointId> = Vec::with_capacity(total);
        let mut pending = points.into_iter().peekable();

        while pending.peek().is_some() {
            let mut batch = Vec::with_capacity(self.upsert_batch);
            let mut batch_ids = Vec::with_capacity(self.upsert_batch);
            for (id, vector, payload) in pending.by_ref().take(self.upsert_batch) {
                let payload = match Payload::try_from(payload) {
                    Ok(p) => p,
                    Err(e) => {
                        self.delete(written).await;
                        return Err(RagError::Qdrant(format!("payload conversion: {e}")));
                    }
                };
                batch_ids.push(PointId::from(id.clone()));
                batch.push(PointStruct::new(id, vector, payload));
            }

            let res = self
                .client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, batch).wait(true))
                .await;

            if let Err(e) = res {
                warn!(collection = %self.collection, error = %e, rollback = written.len(), "upsert failed, rolling back");
                self.delete(written).await;
                return Err(e.into());
            }
            written.extend(batch_ids);
        }

        debug!(collection = %self.collection, total, "upsert completed");
        Ok(total)
    }

    async fn delete(&self, ids: Vec<PointId>) {
        if ids.is_empty() {
            return;
        }
        let res = self
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await;
        if let Err(e) = res {
            warn!(collection = %self.collection, error = %e, "rollback delete failed");
        }
    }

    /// Payloads of the given point ids that already exist.
    pub async fn get_payloads(&self, ids: Vec<String>) -> Result<Vec<Value>, RagError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<PointId> = ids.into_iter().map(PointId::from).collect();
        let res = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, ids).with_payload(true))
            .await?;
        Ok(res
            .result
            .into_iter()
            .map(|p| payload_to_json(p.payload))
            .collect())
    }

    pub async fn count(&self) -> Result<u64, RagError> {
        let res = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await?;
        Ok(res.result.map(|r| r.count).unwrap_or(0))
    }

    /// Similarity search returning `(score, payload)` in Qdrant's order.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<(f32, Value)>, RagError> {
        let mut builder = SearchPointsBuilder::new(&self.collection, vector, top_k)
            .with_payload(true);
        if self.exact {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = self.client.search_points(builder).await?;
        let out: Vec<(f32, Value)> = res
            .result
            .into_iter()
            .map(|r| (r.score, payload_to_json(r.payload)))
            .collect();

        debug!(collection = %self.collection, hits = out.len(), "search completed");
        Ok(out)
    }
}

/// Converts a Qdrant payload map into a JSON object.
fn payload_to_json(p: HashMap<String, QValue>) -> Value {
    Value::Object(p.into_iter().map(|(k, v)| (k, qvalue_to_json(v))).collect())
}

fn qvalue_to_json(v: QValue) -> Value {
    match v.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(f)) => Value::from(f),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::StructValue(s)) => payload_to_json(s.fields),
        Some(Kind::ListValue(l)) => {
            Value::Array(l.values.into_iter().map(qvalue_to_json).collect())
        }
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}
