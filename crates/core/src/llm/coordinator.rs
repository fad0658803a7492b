// crates/core/src/llm/coordinator.rs
//! The coordination layer over a raw provider: fingerprint cache, retry
//! wrapper, optional batching, cancellation, stats.
//!
//! Contract for callers: `complete(system, user) -> text or error`. Each
//! caller observes its own request serialized; no ordering is guaranteed
//! across concurrent callers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::batch::{Batcher, BatcherConfig};
use super::cache::{fingerprint, CompletionCache};
use super::provider::LlmProvider;
use super::types::{CompletionRequest, LlmError};
use crate::stats::StatsCollector;

/// Fixed-delay retry schedule. `max_retries` counts attempts after the
/// first failure, so `max_retries = 3` means up to four calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub retry: RetryPolicy,
    pub cache_capacity: usize,
    /// `Some` enables the request batcher.
    pub batch: Option<BatcherConfig>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_capacity: 10_000,
            batch: None,
        }
    }
}

pub struct LlmCoordinator {
    provider: Arc<dyn LlmProvider>,
    cache: Arc<CompletionCache>,
    stats: StatsCollector,
    cancel: CancellationToken,
    retry: RetryPolicy,
    batcher: Option<Batcher>,
    model_id: String,
}

impl LlmCoordinator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: CoordinatorConfig,
        stats: StatsCollector,
        cancel: CancellationToken,
    ) -> Self {
        let cache = Arc::new(CompletionCache::new(config.cache_capacity));
        let model_id = provider.model().to_string();
        let batcher = config.batch.map(|batch_config| {
            Batcher::spawn(
                provider.clone(),
                cache.clone(),
                stats.clone(),
                batch_config,
                config.retry,
                cancel.clone(),
            )
        });
        Self {
            provider,
            cache,
            stats,
            cancel,
            retry: config.retry,
            batcher,
            model_id,
        }
    }

    /// Run one completion through cache, batcher (when enabled) and the
    /// retry wrapper. Retried attempts reuse identical prompts, hence the
    /// same cache key; the cache is written only on success.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let fp = fingerprint(&self.model_id, system_prompt, user_prompt);
        if let Some(hit) = self.cache.get(&fp) {
            self.stats.record_cache_hit();
            tracing::trace!(fingerprint = %&fp[..12], "llm: cache hit");
            return Ok(hit);
        }
        self.stats.record_cache_miss();

        if self.cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let request = CompletionRequest::new(system_prompt, user_prompt);
        let result = match &self.batcher {
            Some(batcher) => batcher.submit(fp.clone(), request).await,
            None => {
                let text =
                    call_with_retries(&self.provider, &request, self.retry, &self.cancel, &self.stats)
                        .await?;
                self.cache.put(fp, text.clone());
                Ok(text)
            }
        };

        self.stats
            .set_cache_size(self.cache.len(), self.cache.approx_bytes());
        result
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn cache_len(&self) -> u64 {
        self.cache.len()
    }
}

/// Retry loop shared by the direct path and the batcher. Cancellation is
/// honored between attempts; an in-flight request is allowed to complete.
pub(crate) async fn call_with_retries(
    provider: &Arc<dyn LlmProvider>,
    request: &CompletionRequest,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    stats: &StatsCollector,
) -> Result<String, LlmError> {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        let t0 = std::time::Instant::now();
        match provider.complete(request.clone()).await {
            Ok(response) => {
                stats.record_ai_request(Duration::from_millis(response.latency_ms), true);
                return Ok(response.content);
            }
            Err(err) => {
                stats.record_ai_request(t0.elapsed(), false);
                stats.record_error(err.error_type(), err.to_string());
                if attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(attempt, error = %err, "llm: call failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedProvider;

    fn coordinator(
        provider: ScriptedProvider,
        config: CoordinatorConfig,
    ) -> (LlmCoordinator, Arc<ScriptedProvider>, StatsCollector, CancellationToken) {
        let provider = Arc::new(provider);
        let stats = StatsCollector::new();
        let cancel = CancellationToken::new();
        let coordinator = LlmCoordinator::new(
            provider.clone() as Arc<dyn LlmProvider>,
            config,
            stats.clone(),
            cancel.clone(),
        );
        (coordinator, provider, stats, cancel)
    }

    fn fast_retry(max_retries: u32) -> CoordinatorConfig {
        CoordinatorConfig {
            retry: RetryPolicy {
                max_retries,
                delay: Duration::from_millis(1),
            },
            cache_capacity: 100,
            batch: None,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_bypasses_network() {
        let provider = ScriptedProvider::new();
        provider.push_response("ответ");
        let (coordinator, provider, stats, _cancel) = coordinator(provider, fast_retry(0));

        let first = coordinator.complete("sys", "вопрос").await.unwrap();
        let second = coordinator.complete("sys", "вопрос").await.unwrap();
        assert_eq!(first, "ответ");
        assert_eq!(second, "ответ");
        // Only one provider call; the second came from cache
        assert_eq!(provider.request_count(), 1);
        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.cache_size, 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let provider = ScriptedProvider::new();
        provider.push_error(LlmError::Timeout(30));
        provider.push_error(LlmError::Api {
            status: 503,
            body: "overloaded".into(),
        });
        provider.push_response("третья попытка");
        let (coordinator, provider, stats, _cancel) = coordinator(provider, fast_retry(3));

        let result = coordinator.complete("sys", "вопрос").await.unwrap();
        assert_eq!(result, "третья попытка");
        assert_eq!(provider.request_count(), 3);
        let snap = stats.snapshot();
        assert_eq!(snap.ai_requests, 3);
        assert_eq!(snap.ai_failures, 2);
        assert_eq!(snap.errors_by_type["ai_transient"], 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = ScriptedProvider::new();
        for _ in 0..3 {
            provider.push_error(LlmError::Timeout(30));
        }
        let (coordinator, provider, _stats, _cancel) = coordinator(provider, fast_retry(2));

        let err = coordinator.complete("sys", "вопрос").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
        assert_eq!(provider.request_count(), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_failure_writes_no_cache_entry() {
        let provider = ScriptedProvider::new();
        provider.push_error(LlmError::Timeout(30));
        provider.push_response("после провала");
        let (coordinator, provider, _stats, _cancel) = coordinator(provider, fast_retry(0));

        assert!(coordinator.complete("sys", "вопрос").await.is_err());
        assert_eq!(coordinator.cache_len(), 0);
        // A later identical call goes to the provider again
        let result = coordinator.complete("sys", "вопрос").await.unwrap();
        assert_eq!(result, "после провала");
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let provider = ScriptedProvider::always("никогда");
        let (coordinator, provider, _stats, cancel) = coordinator(provider, fast_retry(3));
        cancel.cancel();
        let err = coordinator.complete("sys", "вопрос").await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_batched_path_round_trips() {
        // A one-element batch takes the single-item fast path, so the
        // scripted reply is plain text rather than a JSON array.
        let provider = ScriptedProvider::new();
        provider.push_response("из батча");
        let config = CoordinatorConfig {
            retry: RetryPolicy {
                max_retries: 0,
                delay: Duration::from_millis(1),
            },
            cache_capacity: 100,
            batch: Some(BatcherConfig {
                size: 1,
                flush_interval: Duration::from_millis(10),
            }),
        };
        let (coordinator, _provider, _stats, _cancel) = coordinator(provider, config);

        let result = coordinator.complete("sys", "вопрос").await.unwrap();
        assert_eq!(result, "из батча");
        // The batcher cached the result under the same fingerprint
        assert_eq!(coordinator.cache_len(), 1);
        let again = coordinator.complete("sys", "вопрос").await.unwrap();
        assert_eq!(again, "из батча");
    }
}
