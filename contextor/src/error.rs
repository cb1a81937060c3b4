//! Typed errors for the contextor crate.

use ai_llm_service::{AiLlmError, FailureKind};
use rag_store::RagError;
use thiserror::Error;

/// Why an uploaded file could not be turned into text.
///
/// Always scoped to one file: a batch keeps going after any of these.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Neither a PDF nor plain text.
    #[error("[Contextor] {file_name}: unsupported file type ({content_type})")]
    UnsupportedFileType {
        file_name: String,
        content_type: String,
    },

    /// Bytes are not valid UTF-8, or the PDF extractor gave up.
    #[error("[Contextor] {file_name}: cannot decode: {reason}")]
    Decode { file_name: String, reason: String },

    /// Decoded fine but holds no text.
    #[error("[Contextor] {file_name}: document is empty")]
    EmptyDocument { file_name: String },

    /// The PDF parser rejected the file.
    #[error("[Contextor] {file_name}: pdf error: {reason}")]
    Pdf { file_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ContextorError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Index write or query failure from rag-store.
    #[error(transparent)]
    Index(#[from] RagError),

    /// Generation backend failure (unreachable, rate-limited, timeout, ...).
    #[error(transparent)]
    Generation(#[from] AiLlmError),

    #[error("[Contextor] question is empty")]
    EmptyQuestion,

    #[error("[Contextor] config error: {0}")]
    Config(String),
}

impl ContextorError {
    /// Backend failure class when this wraps a generation error.
    pub fn generation_failure(&self) -> Option<FailureKind> {
        match self {
            Self::Generation(e) => Some(e.failure_kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn generation_timeout_reads_as_unreachable() {
        let err = ContextorError::from(AiLlmError::Timeout(Duration::from_secs(3)));
        assert_eq!(err.generation_failure(), Some(FailureKind::Unreachable));
        assert_eq!(ContextorError::EmptyQuestion.generation_failure(), None);
    }

    #[test]
    fn messages_carry_the_component_tag() {
        let err = ContextorError::from(IngestionError::EmptyDocument {
            file_name: "kz.txt".into(),
        });
        assert_eq!(err.to_string(), "[Contextor] kz.txt: document is empty");
    }
}
