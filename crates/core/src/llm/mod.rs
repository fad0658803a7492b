// crates/core/src/llm/mod.rs
//! LLM coordination layer: provider trait, HTTP backend, fingerprint cache,
//! request batcher, retry wrapper.

pub mod batch;
pub mod cache;
pub mod coordinator;
pub mod http;
pub mod provider;
pub mod scripted;
pub mod types;

pub use batch::BatcherConfig;
pub use cache::fingerprint;
pub use coordinator::{CoordinatorConfig, LlmCoordinator, RetryPolicy};
pub use http::HttpProvider;
pub use provider::LlmProvider;
pub use scripted::ScriptedProvider;
pub use types::{CompletionRequest, CompletionResponse, LlmError};
