//! POST /documents: ingests uploaded PDF or text files.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use contextor::{IngestReport, Upload};
use tracing::{debug, info, instrument};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
};

/// Handler: POST /documents
///
/// Every multipart part carrying a file name is one upload. Files are
/// ingested in the order they appear; a bad file shows up in its own entry
/// of the report without failing the request.
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/documents \
///   -F 'files=@constitution.pdf' -F 'files=@amendments.txt'
/// ```
#[instrument(name = "upload_documents_route", skip_all)]
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<IngestReport>> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!(field = ?field.name(), "skipping non-file part");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        uploads.push(Upload::new(file_name, content_type, bytes.to_vec()));
    }

    if uploads.is_empty() {
        return Err(AppError::bad_request(
            "no files in the multipart body",
            Some("files"),
        ));
    }

    let report = state.pipeline.ingest_batch(&uploads).await;
    info!(files = report.files.len(), failed = report.failed(), "documents uploaded");
    Ok(Json(report))
}
