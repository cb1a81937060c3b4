//! Generation seam consumed by the answer pipeline.
//!
//! The pipeline only needs "prompt in, text out" with a deadline and a way
//! to abort. [`GenerationBackend`] captures that; [`bounded`] applies the
//! deadline and cancellation uniformly to any backend future.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::sampling_config::SamplingConfig;
use crate::error_handler::{AiLlmError, Result};

/// Anything that can turn a prompt into an answer.
pub trait GenerationBackend: Send + Sync {
    /// Generates a completion for `prompt`.
    ///
    /// Implementations must return [`AiLlmError::Cancelled`] promptly once
    /// `cancel` fires.
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        sampling: &'a SamplingConfig,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String>>;

    /// Short label for logs and health output.
    fn name(&self) -> &str {
        "generation"
    }
}

/// Drives `fut` to completion unless `cancel` fires or `timeout` elapses first.
pub async fn bounded<F, T>(fut: F, timeout: Duration, cancel: &CancellationToken) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AiLlmError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(inner) => inner,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "generation deadline exceeded");
                Err(AiLlmError::Timeout(timeout))
            }
        },
    }
}
