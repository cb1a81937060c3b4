//! Ingestion and question answering over a shared index.
//!
//! Each question walks `Idle → Retrieving → PromptAssembling → Generating`
//! and ends in `Done` or `Failed`. Nothing carries over between questions
//! except the index itself.

use std::fmt;
use std::sync::Arc;

use ai_llm_service::{GenerationBackend, LlmServiceProfiles, SamplingConfig};
use rag_store::{
    AddReport, Chunk, Chunker, Index, LlmEmbedder, QaLogSink, QaRecord, RagConfig, open_index,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api_types::{AskOptions, QaAnswer, UsedChunk};
use crate::cfg::ContextorConfig;
use crate::error::ContextorError;
use crate::ingest::{FileOutcome, IngestReport, Upload, extract_text};
use crate::prompt::{self, APOLOGY, Passage, PromptPolicy};

/// Where a question currently is, or where it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Retrieving,
    PromptAssembling,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::PromptAssembling => "prompt_assembling",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal state of one question.
#[derive(Debug)]
pub enum AnswerOutcome {
    Done(QaAnswer),
    /// `stage` is the step that failed; `message` is what the user sees.
    Failed {
        stage: PipelineStage,
        message: String,
        error: ContextorError,
    },
}

impl AnswerOutcome {
    /// Text shown to the user either way.
    pub fn message(&self) -> &str {
        match self {
            Self::Done(qa) => &qa.answer,
            Self::Failed { message, .. } => message,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Chunk → index on the way in, retrieve → prompt → generate on the way out.
pub struct AnswerPipeline {
    index: Arc<dyn Index>,
    generator: Arc<dyn GenerationBackend>,
    chunker: Box<dyn Chunker>,
    qa_log: QaLogSink,
    policy: PromptPolicy,
    sampling: SamplingConfig,
    top_k: usize,
}

impl AnswerPipeline {
    /// # Errors
    /// [`ContextorError::Config`] for an invalid chunk window.
    pub fn new(
        index: Arc<dyn Index>,
        generator: Arc<dyn GenerationBackend>,
        cfg: &ContextorConfig,
    ) -> Result<Self, ContextorError> {
        Ok(Self {
            index,
            generator,
            chunker: cfg.chunk_strategy.build(cfg.chunker_config()?),
            qa_log: QaLogSink::from_url(cfg.qa_log_url.as_deref()),
            policy: cfg.prompt_policy(),
            sampling: cfg.sampling,
            top_k: cfg.top_k,
        })
    }

    /// Wires the LLM profiles in as both generator and embedder.
    pub fn from_services(
        svc: Arc<LlmServiceProfiles>,
        rag_cfg: &RagConfig,
        cfg: &ContextorConfig,
    ) -> Result<Self, ContextorError> {
        let index = open_index(rag_cfg, Arc::new(LlmEmbedder::new(svc.clone())))?;
        Self::new(index, svc, cfg)
    }

    pub fn with_qa_log(mut self, sink: QaLogSink) -> Self {
        self.qa_log = sink;
        self
    }

    pub fn index(&self) -> &Arc<dyn Index> {
        &self.index
    }

    /// Splits `text` with the configured chunker, dropping blank chunks.
    pub fn chunk_text(&self, source: Option<&str>, text: &str) -> Vec<Chunk> {
        self.chunker
            .chunk_document(source, text)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect()
    }

    /// Extract → chunk → add for one file.
    #[instrument(skip_all, fields(file = %upload.file_name))]
    pub async fn ingest(&self, upload: &Upload) -> Result<(usize, AddReport), ContextorError> {
        let text = extract_text(upload).await?;
        let chunks = self.chunk_text(Some(&upload.file_name), &text);
        let count = chunks.len();
        let report = self.index.add(chunks).await?;
        info!(
            chunks = count,
            added = report.added,
            skipped = report.skipped,
            "document ingested"
        );
        Ok((count, report))
    }

    /// Ingests files one by one in upload order. A failing file is recorded
    /// in its outcome and the rest still run.
    pub async fn ingest_batch(&self, uploads: &[Upload]) -> IngestReport {
        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let outcome = match self.ingest(upload).await {
                Ok((chunks, report)) => FileOutcome {
                    file_name: upload.file_name.clone(),
                    chunks,
                    added: report.added,
                    skipped: report.skipped,
                    error: None,
                },
                Err(e) => {
                    warn!(file = %upload.file_name, error = %e, "ingestion failed");
                    FileOutcome {
                        file_name: upload.file_name.clone(),
                        error: Some(e.to_string()),
                        ..FileOutcome::default()
                    }
                }
            };
            files.push(outcome);
        }
        let report = IngestReport { files };
        info!(
            files = uploads.len(),
            failed = report.failed(),
            added = report.added(),
            "batch ingested"
        );
        report
    }

    /// Answers `question`, propagating the first failure.
    pub async fn ask(
        &self,
        question: &str,
        opts: &AskOptions,
        cancel: &CancellationToken,
    ) -> Result<QaAnswer, ContextorError> {
        self.run(question, opts, cancel).await.map_err(|(_, e)| e)
    }

    /// Like [`ask`](Self::ask) but never errors: failures become
    /// [`AnswerOutcome::Failed`] carrying the apologetic message.
    pub async fn answer(
        &self,
        question: &str,
        opts: &AskOptions,
        cancel: &CancellationToken,
    ) -> AnswerOutcome {
        match self.run(question, opts, cancel).await {
            Ok(qa) => AnswerOutcome::Done(qa),
            Err((stage, error)) => {
                warn!(%stage, error = %error, "question failed");
                AnswerOutcome::Failed {
                    stage,
                    message: APOLOGY.to_string(),
                    error,
                }
            }
        }
    }

    #[instrument(skip_all, fields(backend = self.index.backend(), generator = self.generator.name()))]
    async fn run(
        &self,
        question: &str,
        opts: &AskOptions,
        cancel: &CancellationToken,
    ) -> Result<QaAnswer, (PipelineStage, ContextorError)> {
        let question = question.trim();
        if question.is_empty() {
            return Err((PipelineStage::Idle, ContextorError::EmptyQuestion));
        }

        debug!(stage = %PipelineStage::Retrieving);
        let k = opts.top_k.unwrap_or(self.top_k);
        let hits = self
            .index
            .query(question, k)
            .await
            .map_err(|e| (PipelineStage::Retrieving, ContextorError::from(e)))?;

        debug!(stage = %PipelineStage::PromptAssembling, hits = hits.len());
        let passages: Vec<Passage> = hits.iter().map(Passage::from).collect();
        let used = prompt::budget(&passages, self.policy.max_context_chars);
        let prompt = prompt::assemble_passages(question, &used, &self.policy);

        debug!(stage = %PipelineStage::Generating, prompt_chars = prompt.chars().count());
        let sampling = opts.sampling.unwrap_or(self.sampling);
        let answer = self
            .generator
            .generate(&prompt, &sampling, cancel)
            .await
            .map_err(|e| (PipelineStage::Generating, ContextorError::from(e)))?;

        // Budgeted passages are a prefix of the hits, possibly with the first one cut short.
        let context: Vec<UsedChunk> = hits
            .into_iter()
            .zip(used)
            .map(|(hit, passage)| UsedChunk {
                text: passage.text,
                ..UsedChunk::from(hit)
            })
            .collect();

        let record = QaRecord::now(
            question,
            answer.clone(),
            context.iter().map(|c| c.text.clone()).collect(),
        );
        if let Err(e) = self.qa_log.append(&record).await {
            warn!(error = %e, "qa log append failed");
        }

        info!(stage = %PipelineStage::Done, excerpts = context.len(), "question answered");
        Ok(QaAnswer { answer, context })
    }
}

impl fmt::Debug for AnswerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerPipeline")
            .field("backend", &self.index.backend())
            .field("generator", &self.generator.name())
            .field("qa_log", &self.qa_log)
            .field("top_k", &self.top_k)
            .finish()
    }
}
