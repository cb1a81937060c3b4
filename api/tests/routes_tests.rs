//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use ai_llm_service::{
    AiLlmError, GenerationBackend, LlmModelConfig, LlmProvider, LlmServiceProfiles, SamplingConfig,
};
use api::{AppState, router};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use contextor::{AnswerPipeline, ContextorConfig};
use futures::future::BoxFuture;
use rag_store::{DistanceKind, EmbeddingsProvider, InMemoryIndex, RagError};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Letter-frequency embedder, good enough to rank near-identical text first.
struct LetterCounts;

impl EmbeddingsProvider for LetterCounts {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        Box::pin(async move {
            let mut v = vec![0.0f32; 27];
            for c in text.chars().flat_map(char::to_lowercase) {
                let slot = if c.is_ascii_lowercase() { (c as u8 - b'a') as usize } else { 26 };
                v[slot] += 1.0;
            }
            Ok(v)
        })
    }
}

struct Echo {
    fail: bool,
}

impl GenerationBackend for Echo {
    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
        _sampling: &'a SamplingConfig,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, AiLlmError>> {
        Box::pin(async move {
            if self.fail {
                Err(AiLlmError::Timeout(std::time::Duration::from_secs(1)))
            } else {
                Ok("Kazakhstan is a unitary state.".into())
            }
        })
    }
}

fn state(fail: bool, llm: Option<Arc<LlmServiceProfiles>>) -> AppState {
    let index = Arc::new(InMemoryIndex::new(
        Arc::new(LetterCounts),
        DistanceKind::Cosine,
        2,
    ));
    let pipeline =
        AnswerPipeline::new(index, Arc::new(Echo { fail }), &ContextorConfig::default()).unwrap();
    AppState::new(Arc::new(pipeline), llm)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(files: &[(&str, &str, &[u8])]) -> Request<Body> {
    const BOUNDARY: &str = "XBOUNDARYX";
    let mut body = Vec::new();
    for (name, ct, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: {ct}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/documents")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn upload_then_ask_returns_answer_with_context() {
    let app = router(state(false, None));

    let (status, report) = send(
        app.clone(),
        multipart(&[
            (
                "article2.txt",
                "text/plain",
                b"Article 2. The Republic of Kazakhstan is a unitary state.".as_slice(),
            ),
            ("bad.txt", "text/plain", [0xffu8, 0xfe].as_slice()),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["files"][0]["added"], 1);
    assert!(report["files"][0].get("error").is_none());
    assert!(report["files"][1]["error"].is_string());

    let (status, body) = send(
        app,
        post_json("/ask_question", serde_json::json!({ "question": "Is it a unitary state?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failed"], false);
    assert_eq!(body["answer"], "Kazakhstan is a unitary state.");
    assert_eq!(body["context"][0]["source"], "article2.txt");
}

#[tokio::test]
async fn generation_failure_is_reported_in_body() {
    let app = router(state(true, None));
    let (status, body) = send(
        app,
        post_json("/ask_question", serde_json::json!({ "question": "Who is the President?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failed"], true);
    assert_eq!(body["answer"], "Sorry, I encountered an error processing your request.");
    assert_eq!(body["stage"], "generating");
}

#[tokio::test]
async fn blank_question_is_a_bad_request() {
    let app = router(state(false, None));
    let req = post_json("/ask_question", serde_json::json!({ "question": "  " }));
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "EMPTY_QUESTION");
}

#[tokio::test]
async fn missing_question_field_uses_the_envelope() {
    let app = router(state(false, None));
    let req = post_json("/ask_question", serde_json::json!({ "top_k": 3 }));
    let (status, body) = send(app, req).await;
    assert!(status.is_client_error());
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn empty_multipart_is_rejected() {
    let app = router(state(false, None));
    let (status, body) = send(app, multipart(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn health_reports_unreachable_llm_without_failing() {
    let cfg = LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: "mistral".into(),
        endpoint: "http://127.0.0.1:9".into(),
        api_key: None,
        max_tokens: None,
        timeout_secs: Some(2),
    };
    let llm = Arc::new(LlmServiceProfiles::new(cfg.clone(), cfg, Some(1)).unwrap());
    let app = router(state(false, Some(llm)));

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["llm"][0]["ok"], false);
    assert_eq!(body["index"]["backend"], "memory");
    assert_eq!(body["index"]["entries"], 0);
}
