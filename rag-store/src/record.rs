//! Core data models used by the library.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file name.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the 0-based chunk position within its document.
pub const META_CHUNK_INDEX: &str = "chunk_index";
/// Metadata key holding the chunk's start offset in characters.
pub const META_START_CHAR: &str = "start_char";

/// Contiguous segment of a document, the unit of embedding and retrieval.
///
/// Produced by a [`Chunker`](crate::Chunker); `id` is filled in by the index
/// on `add` when absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Position within the document (0-based).
    pub order: usize,
    /// Offset of the first character within the document, in chars.
    pub start: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

/// A stored chunk together with its embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A single retrieval hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RagHit {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    /// Smaller is closer.
    pub distance: f32,
}

impl RagHit {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

/// Hits ordered by ascending distance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub hits: Vec<RagHit>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RagHit> {
        self.hits.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = RagHit;
    type IntoIter = std::vec::IntoIter<RagHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Outcome of [`Index::add`](crate::Index::add).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReport {
    /// Newly stored entries.
    pub added: usize,
    /// Chunks whose id was already stored with identical text.
    pub skipped: usize,
    /// Ids of every input chunk, in input order.
    pub ids: Vec<String>,
}

/// One answered question, as appended to the Q&A log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub context: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl QaRecord {
    /// Builds a record stamped with the current UTC time.
    pub fn now(
        question: impl Into<String>,
        answer: impl Into<String>,
        context: Vec<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            context,
            timestamp: Utc::now(),
        }
    }
}
