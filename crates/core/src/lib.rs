// crates/core/src/lib.rs
//! Enrichment engine for the nomenorm pipeline: tokenization and attribute
//! extraction, rule categorization, lexical pattern detection, the LLM
//! coordination layer, hierarchical KPVED classification, validation and
//! quality scoring, and the per-run stats sink.
//!
//! Everything here is store-agnostic; persistence lives in `nomenorm-db`
//! and orchestration in `nomenorm-pipeline`.

pub mod attributes;
pub mod categorizer;
pub mod config;
pub mod kpved;
pub mod llm;
pub mod patterns;
pub mod stats;
pub mod tokenizer;
pub mod validation;

pub use attributes::{extract, ExtractionResult};
pub use categorizer::{RuleCategorizer, FALLBACK_CATEGORY};
pub use config::{AiConfig, ConfigError, PipelineConfig, API_KEY_ENV};
pub use kpved::{
    ClassificationOutcome, ClassifierLookup, ClassifierTree, HierarchicalClassifier,
};
pub use llm::{
    BatcherConfig, CoordinatorConfig, HttpProvider, LlmCoordinator, LlmError, LlmProvider,
    RetryPolicy,
};
pub use patterns::{PatternDetector, PatternMatch};
pub use stats::{spawn_sampler, StatsCollector, StatsSnapshot, StatsTimeSeries};
pub use validation::{
    suggestions::derive_suggestions, RuleCategory, RuleSeverity, Validator, Violation,
};
