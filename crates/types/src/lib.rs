// crates/types/src/lib.rs
//! Shared data model for the nomenorm pipeline.
//!
//! Types here are plain data: no I/O, no business logic beyond small
//! parse/format helpers. The store (`nomenorm-db`), the enrichment engine
//! (`nomenorm-core`) and the driver (`nomenorm-pipeline`) all speak these.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw input
// ============================================================================

/// One row of the raw catalog export, exactly as read from the source table.
///
/// Raw items are immutable: the pipeline never writes back to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable integer id; drives processing order and checkpoint resume.
    pub id: i64,
    /// Opaque source reference (1C GUID or similar).
    pub reference: String,
    /// Unique business key. May be empty in dirty exports.
    pub code: String,
    /// Raw free-text item name.
    pub name: String,
}

// ============================================================================
// Extracted attributes
// ============================================================================

/// Numeric or categorical attribute extracted from a raw name,
/// e.g. `("weight", "500", Some("гр"))` or `("dimension", "100x100", None)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeTriple {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl AttributeTriple {
    pub fn new(key: impl Into<String>, value: impl Into<String>, unit: Option<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            unit,
        }
    }
}

// ============================================================================
// Processing tier
// ============================================================================

/// How far an item made it through enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingLevel {
    /// Deterministic rules only.
    Basic,
    /// An accepted LLM refinement contributed to the canonical form.
    AiEnhanced,
    /// Quality score cleared the benchmark threshold in a post-pass.
    Benchmark,
}

impl ProcessingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::AiEnhanced => "ai_enhanced",
            Self::Benchmark => "benchmark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "ai_enhanced" => Some(Self::AiEnhanced),
            "benchmark" => Some(Self::Benchmark),
            _ => None,
        }
    }
}

// ============================================================================
// Normalized output
// ============================================================================

/// One canonical row produced by the pipeline. Represents a whole group of
/// equivalent raw items; `merged_count` records how many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub source_reference: String,
    pub source_name: String,
    pub code: String,
    /// Canonical lowercased, attribute-stripped, token-collapsed form.
    pub normalized_name: String,
    /// Always equal to `normalized_name`.
    pub normalized_reference: String,
    pub category: String,
    /// How many source rows this canonical row represents. Always >= 1.
    pub merged_count: u32,
    /// Confidence of the accepted LLM refinement, 0.0 when rules-only.
    pub ai_confidence: f64,
    pub ai_reasoning: String,
    pub processing_level: ProcessingLevel,
    /// Hierarchical classifier code; empty when classification never ran.
    pub kpved_code: String,
    pub kpved_name: String,
    pub kpved_confidence: f64,
    pub quality_score: f64,
}

impl NormalizedItem {
    /// Build a rules-only item from a raw row and its cleaned name/category.
    pub fn basic(raw: &RawItem, normalized_name: &str, category: &str) -> Self {
        Self {
            source_reference: raw.reference.clone(),
            source_name: raw.name.clone(),
            code: raw.code.clone(),
            normalized_name: normalized_name.to_string(),
            normalized_reference: normalized_name.to_string(),
            category: category.to_string(),
            merged_count: 1,
            ai_confidence: 0.0,
            ai_reasoning: String::new(),
            processing_level: ProcessingLevel::Basic,
            kpved_code: String::new(),
            kpved_name: String::new(),
            kpved_confidence: 0.0,
            quality_score: 0.0,
        }
    }
}

// ============================================================================
// Classifier taxonomy
// ============================================================================

/// The five KPVED hierarchy levels, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierLevel {
    Section,
    Class,
    Subclass,
    Group,
    Subgroup,
}

impl ClassifierLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Class => "class",
            Self::Subclass => "subclass",
            Self::Group => "group",
            Self::Subgroup => "subgroup",
        }
    }

    /// The level expected directly below this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Section => Some(Self::Class),
            Self::Class => Some(Self::Subclass),
            Self::Subclass => Some(Self::Group),
            Self::Group => Some(Self::Subgroup),
            Self::Subgroup => None,
        }
    }

    /// Infer the level from the code shape.
    ///
    /// Single uppercase letter -> section; two digits -> class; `NN.N` ->
    /// subclass; `NN.NN` or `NN.NN.N` -> group; anything longer -> subgroup.
    pub fn from_code(code: &str) -> Option<Self> {
        let chars: Vec<char> = code.chars().collect();
        match chars.as_slice() {
            [c] if c.is_alphabetic() && c.is_uppercase() => Some(Self::Section),
            [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some(Self::Class),
            _ => {
                let parts: Vec<&str> = code.split('.').collect();
                if parts.is_empty() || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
                    return None;
                }
                match parts.as_slice() {
                    [head, tail] if head.len() == 2 && tail.len() == 1 => Some(Self::Subclass),
                    [head, tail] if head.len() == 2 && tail.len() == 2 => Some(Self::Group),
                    [head, mid, tail] if head.len() == 2 && mid.len() == 2 && tail.len() == 1 => {
                        Some(Self::Group)
                    }
                    [head, ..] if head.len() == 2 && parts.len() >= 2 => Some(Self::Subgroup),
                    _ => None,
                }
            }
        }
    }
}

/// One classifier node as stored: `(code, name, parent_code, level)`.
///
/// The in-memory tree (contiguous node array + child index slices) is built
/// from these records by the classifier engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRecord {
    pub code: String,
    pub name: String,
    /// `None` for top-level sections (children of the synthetic root).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    pub level: ClassifierLevel,
}

// ============================================================================
// Grouping
// ============================================================================

/// Key under which equivalent raw items are folded into one canonical row.
/// Insertion order is irrelevant; the pair itself is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub category: String,
    pub normalized_name: String,
}

impl GroupKey {
    pub fn new(category: impl Into<String>, normalized_name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            normalized_name: normalized_name.into(),
        }
    }
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Durable snapshot of run progress; one live file per upload id.
///
/// Serialized as JSON via temp-then-rename. `processed_count` is
/// monotonically non-decreasing within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub processed_count: u64,
    pub last_processed_id: i64,
    pub total_count: u64,
    pub start_time: DateTime<Utc>,
    pub last_save_time: DateTime<Utc>,
    pub upload_id: String,
    pub batch_size: usize,
}

/// A checkpoint older than this while incomplete is considered abandoned.
pub const CHECKPOINT_STALE_AFTER_SECS: i64 = 300;

impl Checkpoint {
    pub fn new(upload_id: impl Into<String>, total_count: u64, batch_size: usize) -> Self {
        let now = Utc::now();
        Self {
            processed_count: 0,
            last_processed_id: 0,
            total_count,
            start_time: now,
            last_save_time: now,
            upload_id: upload_id.into(),
            batch_size,
        }
    }

    /// True when the run looks abandoned: not finished, and the last save is
    /// older than [`CHECKPOINT_STALE_AFTER_SECS`].
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.processed_count < self.total_count
            && now - self.last_save_time > Duration::seconds(CHECKPOINT_STALE_AFTER_SECS)
    }

    pub fn is_complete(&self) -> bool {
        self.processed_count >= self.total_count
    }
}
