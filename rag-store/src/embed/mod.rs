//! Embedding seam and a bounded, order-preserving batch executor.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::errors::RagError;

mod llm;

pub use llm::LlmEmbedder;

/// Provider interface for embedding generation.
///
/// Async because every real provider (Ollama, OpenAI) is an HTTP call.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>>;
}

/// Embeds `texts` with at most `concurrency` requests in flight.
///
/// Output order matches input order. Fails on the first provider error or
/// on an empty vector.
pub async fn embed_all(
    provider: &dyn EmbeddingsProvider,
    texts: &[&str],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    debug!(total = texts.len(), concurrency, "embedding batch");
    let vectors: Vec<Vec<f32>> = stream::iter(0..texts.len())
        .map(move |i| provider.embed(texts[i]))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    if vectors.iter().any(Vec::is_empty) {
        return Err(RagError::Embedding("provider returned an empty vector".into()));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps inversely to input length so completion order differs from input order.
    struct Slow {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EmbeddingsProvider for Slow {
        fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20 / text.len() as u64)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if text == "boom" {
                    return Err(RagError::Embedding("boom".into()));
                }
                if text == "void" {
                    return Ok(Vec::new());
                }
                Ok(vec![text.len() as f32])
            })
        }
    }

    fn slow() -> Slow {
        Slow {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn keeps_input_order_and_bounds_concurrency() {
        let p = slow();
        let out = embed_all(&p, &["a", "bbbb", "cc", "ddddd", "e"], 2).await.unwrap();
        assert_eq!(out, vec![vec![1.0], vec![4.0], vec![2.0], vec![5.0], vec![1.0]]);
        assert!(p.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn provider_error_fails_the_batch() {
        let p = slow();
        let err = embed_all(&p, &["a", "boom", "c"], 4).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn empty_vector_fails_the_batch() {
        let p = slow();
        let err = embed_all(&p, &["a", "void"], 2).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(m) if m.contains("empty vector")));
    }

    #[tokio::test]
    async fn batch_runs_inside_a_boxed_send_future() {
        let p = slow();
        let owned = vec!["one".to_string(), "three".to_string()];
        let fut: BoxFuture<'_, Result<Vec<Vec<f32>>, RagError>> = Box::pin(async {
            let texts: Vec<&str> = owned.iter().map(String::as_str).collect();
            embed_all(&p, &texts, 2).await
        });
        assert_eq!(fut.await.unwrap(), vec![vec![3.0], vec![5.0]]);
    }
}
