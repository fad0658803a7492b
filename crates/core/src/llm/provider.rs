// crates/core/src/llm/provider.rs
//! LlmProvider trait defining the interface for LLM backends.

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, LlmError};

/// A stateless completion backend.
///
/// Implementations:
/// - [`HttpProvider`](super::http::HttpProvider): OpenAI-compatible
///   chat-completions endpoint
/// - [`ScriptedProvider`](super::scripted::ScriptedProvider): canned
///   responses for tests
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion with system + user prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Provider name for logging/display (e.g. "openai-http", "scripted").
    fn name(&self) -> &str;

    /// Model identifier used for cache fingerprinting.
    fn model(&self) -> &str;
}
