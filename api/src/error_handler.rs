use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

/// Public application error type.
///
/// Pipeline failures never reach this type: ingestion errors are reported
/// per file and question failures are answered with the apology.
#[derive(Debug, Error)]
pub enum AppError {
    // --- IO / server ---
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        path: Option<String>,
    },

    #[error("question must not be empty")]
    EmptyQuestion,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, path: Option<&str>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            path: path.map(str::to_string),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } | AppError::EmptyQuestion => StatusCode::BAD_REQUEST,
            AppError::Bind { .. } | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Bind { .. } => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest { .. } => "BAD_REQUEST",
            AppError::EmptyQuestion => "EMPTY_QUESTION",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            AppError::BadRequest { path: Some(p), .. } => vec![ApiErrorDetail {
                path: Some(p.clone()),
                hint: None,
            }],
            AppError::EmptyQuestion => vec![ApiErrorDetail {
                path: Some("question".into()),
                hint: None,
            }],
            _ => Vec::new(),
        };
        ApiResponse::<()>::error(self.error_code(), self.to_string(), details)
            .into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::bad_request(err.body_text(), None)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::bad_request(err.body_text(), Some("files"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_client_errors() {
        let empty = AppError::EmptyQuestion;
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(empty.error_code(), "EMPTY_QUESTION");

        let bad = AppError::bad_request("missing field `question`", None);
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn server_errors_are_internal() {
        let e = AppError::Server(std::io::Error::other("accept failed"));
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.error_code(), "SERVER_ERROR");
    }
}
