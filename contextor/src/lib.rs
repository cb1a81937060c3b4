//! Retrieval-augmented answering over uploaded constitution documents.
//!
//! Build one [`AnswerPipeline`] at startup and share it. It ingests uploads
//! (PDF or text) into the index and answers questions by retrieving top-K
//! excerpts, assembling a bounded prompt and calling the generation backend.

pub mod cfg;
mod error;
pub mod ingest;
mod pipeline;
pub mod prompt;

mod api_types;

pub use api_types::{AskOptions, QaAnswer, UsedChunk};
pub use cfg::ContextorConfig;
pub use error::{ContextorError, IngestionError};
pub use ingest::{FileOutcome, IngestReport, Upload, UploadKind};
pub use pipeline::{AnswerOutcome, AnswerPipeline, PipelineStage};
pub use prompt::{PromptFormat, PromptPolicy};
