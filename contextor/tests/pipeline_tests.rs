//! End-to-end behaviour of the answer pipeline with in-process fakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ai_llm_service::{
    AiLlmError, FailureKind, GenerationBackend, LlmModelConfig, LlmProvider, LlmServiceProfiles,
    SamplingConfig,
};
use contextor::prompt::{APOLOGY, NO_CONTEXT};
use contextor::{
    AnswerOutcome, AnswerPipeline, AskOptions, ContextorConfig, ContextorError, PipelineStage,
    Upload,
};
use futures::future::BoxFuture;
use rag_store::{
    DistanceKind, EmbeddingsProvider, InMemoryIndex, Index, META_CHUNK_INDEX, QaLog, QaLogSink,
    QaRecord, RagError,
};
use tokio_util::sync::CancellationToken;

/// Bag of hashed word tokens; shared words pull vectors together.
struct HashingEmbedder;

const DIM: usize = 1024;

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

impl EmbeddingsProvider for HashingEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        Box::pin(async move {
            let mut v = vec![0.0f32; DIM];
            for tok in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                v[(fnv1a(&tok.to_lowercase()) % DIM as u64) as usize] += 1.0;
            }
            Ok(v)
        })
    }
}

/// Hashing embedder that can be switched off after ingestion.
#[derive(Default)]
struct SwitchableEmbedder {
    down: AtomicBool,
}

impl EmbeddingsProvider for SwitchableEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        if self.down.load(Ordering::SeqCst) {
            return Box::pin(async { Err(RagError::Embedding("connection refused".into())) });
        }
        HashingEmbedder.embed(text)
    }
}

/// Always answers with the same text and remembers every prompt.
#[derive(Default)]
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
}

impl GenerationBackend for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        _sampling: &'a SamplingConfig,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, AiLlmError>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Article 1 declares Kazakhstan a democratic, secular, legal and social state.".into())
        })
    }
}

#[derive(Default)]
struct RecordingLog {
    records: Mutex<Vec<QaRecord>>,
}

impl QaLog for RecordingLog {
    fn append<'a>(&'a self, record: &'a QaRecord) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async move {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        })
    }
}

struct BrokenLog;

impl QaLog for BrokenLog {
    fn append<'a>(&'a self, _record: &'a QaRecord) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async { Err(RagError::QaLog("disk full".into())) })
    }
}

fn memory_index() -> Arc<dyn Index> {
    Arc::new(InMemoryIndex::new(
        Arc::new(HashingEmbedder),
        DistanceKind::Cosine,
        4,
    ))
}

fn unreachable_llm() -> Arc<LlmServiceProfiles> {
    let cfg = LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: "mistral".into(),
        endpoint: "http://127.0.0.1:9".into(),
        api_key: None,
        max_tokens: None,
        timeout_secs: Some(5),
    };
    Arc::new(LlmServiceProfiles::new(cfg.clone(), cfg, Some(1)).unwrap())
}

/// Distinct numbered words, cut to exactly `len` ASCII chars.
fn document(len: usize) -> String {
    let mut s = String::new();
    let mut i = 0;
    while s.len() < len {
        s.push_str(&format!("clause{i} "));
        i += 1;
    }
    s.truncate(len);
    s
}

fn opts() -> AskOptions {
    AskOptions::default()
}

#[tokio::test]
async fn substring_of_second_chunk_retrieves_it_first() {
    let generator = Arc::new(ScriptedGenerator::default());
    let log = Arc::new(RecordingLog::default());
    let pipeline =
        AnswerPipeline::new(memory_index(), generator.clone(), &ContextorConfig::default())
            .unwrap()
        .with_qa_log(QaLogSink::new(log.clone()));

    let text = document(2500);
    let (chunks, report) = pipeline
        .ingest(&Upload::text("constitution.txt", text.clone()))
        .await
        .unwrap();
    assert_eq!(chunks, 4);
    assert_eq!(report.added, 4);

    let mut all = pipeline.index().query("clause1", usize::MAX).await.unwrap().hits;
    all.sort_by_key(|h| h.metadata[META_CHUNK_INDEX].parse::<usize>().unwrap());
    let lengths: Vec<usize> = all.iter().map(|h| h.text.chars().count()).collect();
    assert_eq!(lengths, vec![1000, 1000, 900, 100]);

    let question = &text[1100..1500];
    let qa = pipeline
        .ask(question, &opts(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(qa.context.len(), 4);
    assert!(qa.context[0].text.contains(question.trim()));
    assert_eq!(qa.context[0].text, all[1].text);
    assert_eq!(qa.context[0].source.as_deref(), Some("constitution.txt"));

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Excerpt 1 (source: constitution.txt):"));
    assert!(prompts[0].contains(&all[1].text.trim()[..200]));

    let records = log.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].answer, qa.answer);
    assert_eq!(records[0].context.len(), 4);
}

#[tokio::test]
async fn undecodable_second_upload_does_not_stop_the_batch() {
    let pipeline = AnswerPipeline::new(
        memory_index(),
        Arc::new(ScriptedGenerator::default()),
        &ContextorConfig::default(),
    )
    .unwrap();

    let uploads = vec![
        Upload::text(
            "article1.txt",
            "Article 1. The Republic of Kazakhstan proclaims itself a democratic state.",
        ),
        Upload::new("broken.txt", Some("text/plain".into()), vec![0xc3, 0x28, 0xff]),
    ];
    let report = pipeline.ingest_batch(&uploads).await;

    assert_eq!(report.files.len(), 2);
    assert!(report.files[0].is_ok());
    assert_eq!(report.files[0].added, 1);
    assert_eq!(report.files[1].file_name, "broken.txt");
    assert!(report.files[1].error.as_deref().unwrap().contains("cannot decode"));
    assert_eq!(report.failed(), 1);
    assert_eq!(pipeline.index().len().await.unwrap(), 1);
}

#[tokio::test]
async fn unreachable_generator_fails_with_apology_and_logs_nothing() {
    let log = Arc::new(RecordingLog::default());
    let pipeline =
        AnswerPipeline::new(memory_index(), unreachable_llm(), &ContextorConfig::default())
            .unwrap()
        .with_qa_log(QaLogSink::new(log.clone()));
    pipeline
        .ingest(&Upload::text("kz.txt", "Article 2. Kazakhstan is a unitary state."))
        .await
        .unwrap();

    let outcome = pipeline
        .answer("Is Kazakhstan a unitary state?", &opts(), &CancellationToken::new())
        .await;

    match &outcome {
        AnswerOutcome::Failed { stage, message, error } => {
            assert_eq!(*stage, PipelineStage::Generating);
            assert_eq!(message, APOLOGY);
            assert_eq!(error.generation_failure(), Some(FailureKind::Unreachable));
        }
        AnswerOutcome::Done(qa) => panic!("expected failure, got answer {:?}", qa.answer),
    }
    assert_eq!(outcome.message(), APOLOGY);
    assert!(log.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_question_is_reported_as_cancelled() {
    let pipeline =
        AnswerPipeline::new(memory_index(), unreachable_llm(), &ContextorConfig::default())
            .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.ask("Who is the President?", &opts(), &cancel).await.unwrap_err();
    assert_eq!(err.generation_failure(), Some(FailureKind::Cancelled));
}

#[tokio::test]
async fn empty_index_still_answers_with_no_context_marker() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline =
        AnswerPipeline::new(memory_index(), generator.clone(), &ContextorConfig::default())
            .unwrap();

    let qa = pipeline
        .ask("What does Article 5 say?", &opts(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(qa.context.is_empty());
    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains(NO_CONTEXT));
}

#[tokio::test]
async fn blank_question_fails_before_retrieval() {
    let pipeline = AnswerPipeline::new(
        memory_index(),
        Arc::new(ScriptedGenerator::default()),
        &ContextorConfig::default(),
    )
    .unwrap();

    let outcome = pipeline.answer("   ", &opts(), &CancellationToken::new()).await;
    assert!(matches!(
        outcome,
        AnswerOutcome::Failed {
            stage: PipelineStage::Idle,
            error: ContextorError::EmptyQuestion,
            ..
        }
    ));
}

#[tokio::test]
async fn qa_log_failure_does_not_fail_the_answer() {
    let pipeline = AnswerPipeline::new(
        memory_index(),
        Arc::new(ScriptedGenerator::default()),
        &ContextorConfig::default(),
    )
    .unwrap()
    .with_qa_log(QaLogSink::new(Arc::new(BrokenLog)));

    let outcome = pipeline
        .answer("What is the capital?", &opts(), &CancellationToken::new())
        .await;
    assert!(!outcome.is_failed());
}

#[tokio::test]
async fn top_k_override_and_budget_limit_the_context() {
    let generator = Arc::new(ScriptedGenerator::default());
    let cfg = ContextorConfig {
        max_ctx_chars: Some(1500),
        ..ContextorConfig::default()
    };
    let pipeline = AnswerPipeline::new(memory_index(), generator, &cfg).unwrap();
    pipeline
        .ingest(&Upload::text("constitution.txt", document(2500)))
        .await
        .unwrap();

    let qa = pipeline
        .ask(
            "clause10 clause20",
            &AskOptions {
                top_k: Some(3),
                ..AskOptions::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    // Three retrieved; the budget keeps the first 1000-char excerpt plus
    // whatever next one still fits.
    assert!(!qa.context.is_empty() && qa.context.len() < 3);
}

#[tokio::test]
async fn jsonl_log_is_written_through_the_config_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qa.jsonl");
    let cfg = ContextorConfig {
        qa_log_url: Some(format!("jsonl://{}", path.display())),
        ..ContextorConfig::default()
    };
    let pipeline = AnswerPipeline::new(
        memory_index(),
        Arc::new(ScriptedGenerator::default()),
        &cfg,
    )
    .unwrap();

    pipeline
        .ask("Which language is official?", &opts(), &CancellationToken::new())
        .await
        .unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    let line: serde_json::Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
    assert_eq!(line["question"], "Which language is official?");
    assert!(line["timestamp"].is_string());
}

#[tokio::test]
async fn embedder_outage_fails_at_retrieval_and_logs_nothing() {
    let embedder = Arc::new(SwitchableEmbedder::default());
    let index: Arc<dyn Index> = Arc::new(InMemoryIndex::new(
        embedder.clone(),
        DistanceKind::Cosine,
        4,
    ));
    let log = Arc::new(RecordingLog::default());
    let pipeline = AnswerPipeline::new(
        index,
        Arc::new(ScriptedGenerator::default()),
        &ContextorConfig::default(),
    )
    .unwrap()
    .with_qa_log(QaLogSink::new(log.clone()));
    pipeline
        .ingest(&Upload::text("kz.txt", "Article 7. The state language is Kazakh."))
        .await
        .unwrap();

    embedder.down.store(true, Ordering::SeqCst);
    let outcome = pipeline
        .answer("What is the state language?", &opts(), &CancellationToken::new())
        .await;

    match &outcome {
        AnswerOutcome::Failed { stage, message, error } => {
            assert_eq!(*stage, PipelineStage::Retrieving);
            assert_eq!(message, APOLOGY);
            assert!(matches!(error, ContextorError::Index(RagError::IndexQuery(_))));
        }
        AnswerOutcome::Done(qa) => panic!("expected failure, got answer {:?}", qa.answer),
    }
    assert!(log.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn truncated_excerpt_is_the_context_returned_and_logged() {
    let generator = Arc::new(ScriptedGenerator::default());
    let log = Arc::new(RecordingLog::default());
    let cfg = ContextorConfig {
        max_ctx_chars: Some(10),
        ..ContextorConfig::default()
    };
    let pipeline = AnswerPipeline::new(memory_index(), generator.clone(), &cfg)
        .unwrap()
        .with_qa_log(QaLogSink::new(log.clone()));
    let full = "Article 1 says the Republic is unitary";
    pipeline.ingest(&Upload::text("kz.txt", full)).await.unwrap();

    let qa = pipeline
        .ask("Is the Republic unitary?", &opts(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(qa.context.len(), 1);
    assert_eq!(qa.context[0].text, "Article 1 ");
    assert_eq!(qa.context[0].source.as_deref(), Some("kz.txt"));

    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains(qa.context[0].text.trim()));
    assert!(!prompts[0].contains(full));

    let records = log.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].context, vec![qa.context[0].text.clone()]);
}
