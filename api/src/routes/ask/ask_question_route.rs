//! POST /ask_question: answers a question from the indexed documents.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use contextor::{AnswerOutcome, AskOptions};
use tracing::{info, instrument};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::ask::ask_request::{AskRequest, AskResponse},
};

/// Handler: POST /ask_question
///
/// Backend failures still answer `200` with `failed: true` and the
/// apologetic message; only malformed requests are rejected.
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/ask_question \
///   -H 'content-type: application/json' \
///   -d '{"question":"What does Article 1 establish?","top_k":5}'
/// ```
#[instrument(name = "ask_question_route", skip_all)]
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> AppResult<Json<AskResponse>> {
    let Json(body) = body?;
    if body.question.trim().is_empty() {
        return Err(AppError::EmptyQuestion);
    }

    let opts = AskOptions {
        top_k: body.top_k,
        ..AskOptions::default()
    };
    let cancel = state.shutdown.child_token();

    let response = match state.pipeline.answer(&body.question, &opts, &cancel).await {
        AnswerOutcome::Done(qa) => AskResponse {
            answer: qa.answer,
            context: qa.context.into_iter().map(Into::into).collect(),
            failed: false,
            stage: None,
        },
        AnswerOutcome::Failed { stage, message, .. } => AskResponse {
            answer: message,
            context: Vec::new(),
            failed: true,
            stage: Some(stage),
        },
    };

    info!(failed = response.failed, excerpts = response.context.len(), "question handled");
    Ok(Json(response))
}
