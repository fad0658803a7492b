// crates/core/src/llm/batch.rs
//! Request batcher: bounded queue, size/interval flush, index fan-out.
//!
//! Submitters enqueue `(system, user)` requests, each carrying a oneshot
//! reply channel, and block only on their own result. The worker fires a
//! batch when the queue reaches the configured size or when the flush
//! interval has elapsed since the oldest queued item. A batch goes out as
//! one user prompt enumerating the inputs; the JSON-array response is
//! mapped back by index. Missing indices (or a failed batch call) fall back
//! to single-item calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::cache::CompletionCache;
use super::coordinator::{call_with_retries, RetryPolicy};
use super::provider::LlmProvider;
use super::types::{CompletionRequest, LlmError};
use crate::stats::StatsCollector;

#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    pub size: usize,
    pub flush_interval: Duration,
}

pub(crate) struct BatchSubmission {
    pub fingerprint: String,
    pub request: CompletionRequest,
    pub reply: oneshot::Sender<Result<String, LlmError>>,
}

/// Handle to the batcher worker task.
pub struct Batcher {
    tx: mpsc::Sender<BatchSubmission>,
    _worker: tokio::task::JoinHandle<()>,
}

impl Batcher {
    pub fn spawn(
        provider: Arc<dyn LlmProvider>,
        cache: Arc<CompletionCache>,
        stats: StatsCollector,
        config: BatcherConfig,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        let worker = tokio::spawn(worker_loop(rx, provider, cache, stats, config, retry, cancel));
        Self {
            tx,
            _worker: worker,
        }
    }

    /// Enqueue one request and wait for its own result.
    pub(crate) async fn submit(
        &self,
        fingerprint: String,
        request: CompletionRequest,
    ) -> Result<String, LlmError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BatchSubmission {
                fingerprint,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LlmError::Cancelled)?;
        reply_rx.await.map_err(|_| LlmError::Cancelled)?
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    mut rx: mpsc::Receiver<BatchSubmission>,
    provider: Arc<dyn LlmProvider>,
    cache: Arc<CompletionCache>,
    stats: StatsCollector,
    config: BatcherConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
) {
    let max_size = config.size.max(1);
    let mut pending: Vec<BatchSubmission> = Vec::new();
    let mut oldest_at = tokio::time::Instant::now();

    loop {
        if pending.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(sub) => {
                        oldest_at = tokio::time::Instant::now();
                        pending.push(sub);
                    }
                    None => break,
                },
            }
        } else {
            let deadline = oldest_at + config.flush_interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {
                    flush(std::mem::take(&mut pending), &provider, &cache, &stats, retry, &cancel).await;
                }
                item = rx.recv() => match item {
                    Some(sub) => {
                        pending.push(sub);
                        if pending.len() >= max_size {
                            flush(std::mem::take(&mut pending), &provider, &cache, &stats, retry, &cancel).await;
                        }
                    }
                    None => {
                        flush(std::mem::take(&mut pending), &provider, &cache, &stats, retry, &cancel).await;
                        break;
                    }
                },
            }
        }

        if pending.len() >= max_size {
            flush(std::mem::take(&mut pending), &provider, &cache, &stats, retry, &cancel).await;
        }
    }

    // Cancellation (or closed channel): unblock everything still queued.
    for sub in pending.drain(..) {
        let _ = sub.reply.send(Err(LlmError::Cancelled));
    }
    while let Ok(sub) = rx.try_recv() {
        let _ = sub.reply.send(Err(LlmError::Cancelled));
    }
}

async fn flush(
    batch: Vec<BatchSubmission>,
    provider: &Arc<dyn LlmProvider>,
    cache: &Arc<CompletionCache>,
    stats: &StatsCollector,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) {
    if batch.is_empty() {
        return;
    }
    stats.record_batch(batch.len() as u64);
    tracing::debug!(items = batch.len(), "llm batch: flushing");

    if batch.len() == 1 {
        if let Some(sub) = batch.into_iter().next() {
            complete_single(sub, provider, cache, stats, retry, cancel).await;
        }
        return;
    }

    let combined = CompletionRequest {
        system_prompt: batch[0].request.system_prompt.clone(),
        user_prompt: build_batch_prompt(&batch),
    };

    match call_with_retries(provider, &combined, retry, cancel, stats).await {
        Ok(text) => {
            let by_index = parse_batch_array(&text, batch.len());
            for (i, sub) in batch.into_iter().enumerate() {
                match by_index.get(i).and_then(|slot| slot.clone()) {
                    Some(element) => {
                        cache.put(sub.fingerprint, element.clone());
                        let _ = sub.reply.send(Ok(element));
                    }
                    None => {
                        // Partial return: this index goes out alone.
                        stats.record_error(
                            "ai_invalid_response",
                            format!("batch response missing index {i}"),
                        );
                        complete_single(sub, provider, cache, stats, retry, cancel).await;
                    }
                }
            }
        }
        Err(LlmError::Cancelled) => {
            for sub in batch {
                let _ = sub.reply.send(Err(LlmError::Cancelled));
            }
        }
        Err(err) => {
            // Batch-level failure (already counted by the retry wrapper):
            // fall back to single-item calls for every index.
            tracing::warn!(error = %err, "llm batch: batch call failed, falling back to singles");
            for sub in batch {
                complete_single(sub, provider, cache, stats, retry, cancel).await;
            }
        }
    }
}

async fn complete_single(
    sub: BatchSubmission,
    provider: &Arc<dyn LlmProvider>,
    cache: &Arc<CompletionCache>,
    stats: &StatsCollector,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) {
    let result = call_with_retries(provider, &sub.request, retry, cancel, stats).await;
    if let Ok(ref text) = result {
        cache.put(sub.fingerprint, text.clone());
    }
    let _ = sub.reply.send(result);
}

/// One user prompt enumerating every queued input.
fn build_batch_prompt(batch: &[BatchSubmission]) -> String {
    let mut prompt = String::from(
        "Обработай каждый вход независимо. Ответь строго JSON-массивом объектов; \
         каждый объект обязан содержать поле \"index\" с номером входа.\n",
    );
    for (i, sub) in batch.iter().enumerate() {
        prompt.push_str(&format!("\n### Вход {i}\n{}\n", sub.request.user_prompt));
    }
    prompt
}

/// Parse a JSON array out of `text` (tolerating fences/prose around it) and
/// slot each element by its `index` field, re-serialized as the element's
/// own JSON text. Slots missing from the response stay `None`.
fn parse_batch_array(text: &str, expected: usize) -> Vec<Option<String>> {
    let mut slots = vec![None; expected];
    let Some(start) = text.find('[') else {
        return slots;
    };
    let Some(end) = text.rfind(']') else {
        return slots;
    };
    if end < start {
        return slots;
    }
    let Ok(serde_json::Value::Array(elements)) =
        serde_json::from_str::<serde_json::Value>(&text[start..=end])
    else {
        return slots;
    };
    for (pos, element) in elements.into_iter().enumerate() {
        let index = element
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(pos);
        if index < expected && slots[index].is_none() {
            if let Ok(serialized) = serde_json::to_string(&element) {
                slots[index] = Some(serialized);
            }
        }
    }
    slots
}
