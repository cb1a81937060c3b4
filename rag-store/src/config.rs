//! Runtime and collection configuration.

use std::str::FromStr;

use crate::errors::RagError;

/// Distance function used for the vector space.
///
/// Every variant is reported as a distance: smaller is closer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceKind {
    /// `1 - cosine_similarity` (range `[0, 2]`).
    #[default]
    Cosine,
    /// Negated dot product.
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceKind::Cosine => {
                let (dot, na, nb) = a
                    .iter()
                    .zip(b)
                    .fold((0.0f32, 0.0f32, 0.0f32), |(d, x, y), (p, q)| {
                        (d + p * q, x + p * p, y + q * q)
                    });
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (na.sqrt() * nb.sqrt())
                }
            }
            DistanceKind::Dot => -a.iter().zip(b).map(|(p, q)| p * q).sum::<f32>(),
            DistanceKind::Euclid => a
                .iter()
                .zip(b)
                .map(|(p, q)| (p - q) * (p - q))
                .sum::<f32>()
                .sqrt(),
        }
    }

    /// Converts a Qdrant similarity score into a distance.
    pub fn from_qdrant_score(self, score: f32) -> f32 {
        match self {
            DistanceKind::Cosine => 1.0 - score,
            DistanceKind::Dot => -score,
            DistanceKind::Euclid => score,
        }
    }
}

impl FromStr for DistanceKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" | "l2" => Ok(Self::Euclid),
            other => Err(RagError::Config(format!("unknown distance `{other}`"))),
        }
    }
}

/// Where chunk vectors are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexBackend {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// Qdrant collection.
    Qdrant,
}

impl FromStr for IndexBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(RagError::Config(format!("unknown index backend `{other}`"))),
        }
    }
}

/// Configuration for indexing and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    pub backend: IndexBackend,
    pub distance: DistanceKind,
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Upsert batch size.
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Max embedding requests in flight during `add`.
    pub embedding_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            distance: DistanceKind::Cosine,
            qdrant_url: "http://localhost:6334".into(),
            qdrant_api_key: None,
            collection: "constitution_kz".into(),
            upsert_batch: 256,
            exact_search: false,
            embedding_concurrency: 4,
        }
    }
}

impl RagConfig {
    /// Reads `INDEX_BACKEND`, `RAG_DISTANCE`, `QDRANT_URL`, `QDRANT_API_KEY`,
    /// `QDRANT_COLLECTION`, `QDRANT_EXACT`, `EMBEDDING_CONCURRENCY`.
    pub fn from_env() -> Result<Self, RagError> {
        let d = Self::default();
        let cfg = Self {
            backend: env_parse("INDEX_BACKEND")?.unwrap_or(d.backend),
            distance: env_parse("RAG_DISTANCE")?.unwrap_or(d.distance),
            qdrant_url: env_str("QDRANT_URL").unwrap_or(d.qdrant_url),
            qdrant_api_key: env_str("QDRANT_API_KEY"),
            collection: env_str("QDRANT_COLLECTION").unwrap_or(d.collection),
            upsert_batch: env_usize("QDRANT_UPSERT_BATCH")?.unwrap_or(d.upsert_batch),
            exact_search: env_str("QDRANT_EXACT")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(d.exact_search),
            embedding_concurrency: env_usize("EMBEDDING_CONCURRENCY")?
                .unwrap_or(d.embedding_concurrency),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding_concurrency == 0 {
            return Err(RagError::Config("embedding_concurrency must be > 0".into()));
        }
        if self.backend == IndexBackend::Qdrant {
            if self.qdrant_url.trim().is_empty() {
                return Err(RagError::Config("qdrant_url is empty".into()));
            }
            if self.collection.trim().is_empty() {
                return Err(RagError::Config("collection is empty".into()));
            }
            if self.upsert_batch == 0 {
                return Err(RagError::Config("upsert_batch must be > 0".into()));
            }
        }
        Ok(())
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr<Err = RagError>>(name: &str) -> Result<Option<T>, RagError> {
    env_str(name).map(|v| v.parse::<T>()).transpose()
}

fn env_usize(name: &str) -> Result<Option<usize>, RagError> {
    env_str(name)
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                RagError::Config(format!("{name}: expected unsigned integer, got `{v}`"))
            })
        })
        .transpose()
}
