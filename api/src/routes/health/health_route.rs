//! GET /health: LLM reachability and index size.

use std::sync::Arc;

use ai_llm_service::HealthStatus;
use axum::{Json, extract::State};
use serde::Serialize;
use tracing::warn;

use crate::core::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// True when every probe passed and the index answered.
    pub ok: bool,
    pub llm: Vec<HealthStatus>,
    pub index: IndexHealth,
}

#[derive(Debug, Serialize)]
pub struct IndexHealth {
    pub backend: &'static str,
    pub entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handler: GET /health. Always `200`; failures are reported in the body.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm = match &state.llm {
        Some(svc) => svc.health_all().await,
        None => Vec::new(),
    };

    let index = state.pipeline.index();
    let index = match index.len().await {
        Ok(n) => IndexHealth {
            backend: index.backend(),
            entries: Some(n),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "index health probe failed");
            IndexHealth {
                backend: index.backend(),
                entries: None,
                error: Some(e.to_string()),
            }
        }
    };

    let ok = index.error.is_none() && llm.iter().all(|s| s.ok);
    Json(HealthResponse { ok, llm, index })
}
