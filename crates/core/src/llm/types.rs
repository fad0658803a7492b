// crates/core/src/llm/types.rs
//! Request/response/error types for LLM integration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single completion request: system + user prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Completion result from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub latency_ms: u64,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("LLM endpoint returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Failed to parse response: {0}")]
    ParseFailed(String),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("API key is not configured")]
    MissingApiKey,
}

impl LlmError {
    /// Stats counter family for this error.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Api { .. } | Self::Timeout(_) | Self::ParseFailed(_) => {
                "ai_transient"
            }
            Self::InvalidFormat(_) => "ai_invalid_response",
            Self::Cancelled => "cancelled",
            Self::MissingApiKey => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout(30);
        assert_eq!(err.to_string(), "Timeout after 30 seconds");

        let err = LlmError::Api {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "LLM endpoint returned status 503: overloaded");
    }

    #[test]
    fn test_error_type_families() {
        assert_eq!(LlmError::Timeout(30).error_type(), "ai_transient");
        assert_eq!(
            LlmError::ParseFailed("bad json".into()).error_type(),
            "ai_transient"
        );
        assert_eq!(
            LlmError::InvalidFormat("missing field".into()).error_type(),
            "ai_invalid_response"
        );
        assert_eq!(LlmError::Cancelled.error_type(), "cancelled");
    }

    #[test]
    fn test_completion_request_serialize() {
        let req = CompletionRequest::new("system", "классифицируй: молоток");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("молоток"));
    }
}
