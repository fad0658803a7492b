// crates/core/src/llm/scripted.rs
//! Deterministic provider for tests: replays a scripted response sequence.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::{CompletionRequest, CompletionResponse, LlmError};

/// Pops one scripted result per `complete` call, in push order, and records
/// every request it saw. When the script runs dry it returns the fallback
/// (if set) or an `InvalidFormat` error.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    fallback: Option<String>,
    model: String,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
            model: "scripted-model".to_string(),
        }
    }

    /// Provider that answers every request with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.fallback = Some(text.into());
        provider
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.lock_script().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.lock_script().push_back(Err(error));
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, LlmError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self.lock_script().pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                content,
                latency_ms: 1,
            }),
            Some(Err(err)) => Err(err),
            None => match &self.fallback {
                Some(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    latency_ms: 1,
                }),
                None => Err(LlmError::InvalidFormat("script exhausted".to_string())),
            },
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
