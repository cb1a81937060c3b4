//! Uploaded files → plain text.
//!
//! PDFs go through `pdf-extract` on the blocking pool; anything the extractor
//! panics on is reported as a decode error for that file only.

use serde::Serialize;
use tracing::debug;

use crate::error::IngestionError;

/// One uploaded file, alive only while it is being ingested.
#[derive(Clone, Debug)]
pub struct Upload {
    pub file_name: String,
    /// Declared MIME type, if the client sent one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Plain-text upload with a `text/plain` content type.
    pub fn text(file_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(file_name, Some("text/plain".into()), body.into().into_bytes())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Text,
}

impl UploadKind {
    /// Decides by content type first, then by file extension.
    pub fn detect(upload: &Upload) -> Result<Self, IngestionError> {
        let ct = upload
            .content_type
            .as_deref()
            .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase());

        match ct.as_deref() {
            Some("application/pdf") => return Ok(Self::Pdf),
            Some("text/plain") | Some("text/markdown") => return Ok(Self::Text),
            _ => {}
        }

        let ext = upload
            .file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") | Some("md") => Ok(Self::Text),
            _ => Err(IngestionError::UnsupportedFileType {
                file_name: upload.file_name.clone(),
                content_type: ct.unwrap_or_else(|| "unknown".into()),
            }),
        }
    }
}

/// Extracts the document text. Never returns whitespace-only text.
pub async fn extract_text(upload: &Upload) -> Result<String, IngestionError> {
    let kind = UploadKind::detect(upload)?;
    let text = match kind {
        UploadKind::Text => String::from_utf8(upload.bytes.clone()).map_err(|e| {
            IngestionError::Decode {
                file_name: upload.file_name.clone(),
                reason: e.to_string(),
            }
        })?,
        UploadKind::Pdf => extract_pdf(upload).await?,
    };

    if text.trim().is_empty() {
        return Err(IngestionError::EmptyDocument {
            file_name: upload.file_name.clone(),
        });
    }
    debug!(file = %upload.file_name, ?kind, chars = text.chars().count(), "text extracted");
    Ok(text)
}

async fn extract_pdf(upload: &Upload) -> Result<String, IngestionError> {
    let bytes = upload.bytes.clone();
    let joined =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(IngestionError::Pdf {
            file_name: upload.file_name.clone(),
            reason: e.to_string(),
        }),
        Err(e) => Err(IngestionError::Decode {
            file_name: upload.file_name.clone(),
            reason: if e.is_panic() {
                "pdf extractor panicked".into()
            } else {
                e.to_string()
            },
        }),
    }
}

/// Result of ingesting one file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    /// Chunks produced from the file.
    pub chunks: usize,
    pub added: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-file results, in upload order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| !f.is_ok()).count()
    }

    pub fn added(&self) -> usize {
        self.files.iter().map(|f| f.added).sum()
    }
}
