//! HTTP surface: upload documents, ask questions, check health.
//!
//! The server holds no session state; everything lives in [`AppState`],
//! which `main` builds once and hands to [`start`].

use std::{env, sync::Arc};

pub mod core;
pub mod error_handler;
mod middleware_layer;
mod routes;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tokio::signal;
use tracing::{info, warn};

pub use crate::core::app_state::AppState;
pub use crate::error_handler::AppError;

use crate::middleware_layer::json_extractor::json_error_mapper;
use crate::routes::{
    ask::ask_question_route::ask_question, documents::upload_documents_route::upload_documents,
    health::health_route::health,
};

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
/// Upper bound for one multipart request.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Builds the application router around shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/documents", post(upload_documents))
        .route("/ask_question", post(ask_question))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(Arc::new(state))
}

/// Binds `API_ADDRESS` (default `127.0.0.1:8080`) and serves until Ctrl+C.
///
/// # Errors
/// [`AppError::Bind`] if the address is taken, [`AppError::Server`] if the
/// server loop fails.
pub async fn start(state: AppState) -> Result<(), AppError> {
    let addr = env::var("API_ADDRESS")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "listening");

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .map_err(AppError::Server)?;

    info!("server stopped");
    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl+C, shutting down");
    }
}
