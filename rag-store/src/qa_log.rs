//! Append-only question/answer log.
//!
//! The sink is chosen from a connection string:
//! - `jsonl:///var/log/qa.jsonl` or `file:///var/log/qa.jsonl` → one JSON object per line
//! - unset / empty → disabled
//! - anything else → disabled, with a warning

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::record::QaRecord;

/// Destination for answered questions.
pub trait QaLog: Send + Sync {
    fn append<'a>(&'a self, record: &'a QaRecord) -> BoxFuture<'a, Result<(), RagError>>;
}

/// JSON-lines file; writes are serialized so lines never interleave.
#[derive(Debug)]
pub struct JsonlQaLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlQaLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, record: &QaRecord) -> Result<(), RagError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), "qa record appended");
        Ok(())
    }
}

impl QaLog for JsonlQaLog {
    fn append<'a>(&'a self, record: &'a QaRecord) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async move {
            self.write_line(record)
                .await
                .map_err(|e| RagError::QaLog(format!("{}: {e}", self.path.display())))
        })
    }
}

/// Resolved logging target; `None` inside means logging is off.
#[derive(Clone, Default)]
pub struct QaLogSink(Option<Arc<dyn QaLog>>);

impl QaLogSink {
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn new(log: Arc<dyn QaLog>) -> Self {
        Self(Some(log))
    }

    /// Parses a connection string. Never fails: unusable values disable logging.
    pub fn from_url(url: Option<&str>) -> Self {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Self::disabled();
        };

        let path = url
            .strip_prefix("jsonl://")
            .or_else(|| url.strip_prefix("file://"));

        match path {
            Some(p) if !p.is_empty() => {
                debug!(path = p, "qa log enabled");
                Self::new(Arc::new(JsonlQaLog::new(p)))
            }
            _ => {
                warn!(url, "unsupported QA_LOG_URL, question/answer logging disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Appends when enabled; a disabled sink is a no-op.
    pub async fn append(&self, record: &QaRecord) -> Result<(), RagError> {
        match &self.0 {
            Some(log) => log.append(record).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for QaLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("QaLogSink").field(&self.is_enabled()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_parsing() {
        assert!(!QaLogSink::from_url(None).is_enabled());
        assert!(!QaLogSink::from_url(Some("  ")).is_enabled());
        assert!(!QaLogSink::from_url(Some("mongodb://localhost:27017")).is_enabled());
        assert!(!QaLogSink::from_url(Some("jsonl://")).is_enabled());
        assert!(QaLogSink::from_url(Some("jsonl:///tmp/qa.jsonl")).is_enabled());
        assert!(QaLogSink::from_url(Some("file:///tmp/qa.jsonl")).is_enabled());
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/qa.jsonl");
        let sink = QaLogSink::from_url(Some(&format!("jsonl://{}", path.display())));

        for i in 0..3 {
            let rec = QaRecord::now(format!("q{i}"), "a", vec!["Article 1".into()]);
            sink.append(&rec).await.unwrap();
        }

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<QaRecord> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].question, "q2");
        assert_eq!(lines[0].context, vec!["Article 1".to_string()]);
    }

    #[tokio::test]
    async fn unwritable_path_is_a_qa_log_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let log = JsonlQaLog::new(dir.path());
        let err = log
            .append(&QaRecord::now("q", "a", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::QaLog(_)));
    }

    #[tokio::test]
    async fn disabled_sink_is_a_no_op() {
        QaLogSink::disabled()
            .append(&QaRecord::now("q", "a", Vec::new()))
            .await
            .unwrap();
    }
}
