// crates/core/src/kpved/walker.rs
//! Top-down classifier walk.
//!
//! Starting at the synthetic root, each step asks the LLM to pick one child
//! code from a candidate-constrained list, validates the pick, and
//! descends. The aggregate confidence is the product of per-step
//! confidences (more informative than the last step alone; documented
//! decision). Before returning, the final code is validated against the
//! classifier store; a miss halves the confidence.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use nomenorm_types::ClassifierLevel;

use super::prompt::build_level_prompt;
use super::tree::ClassifierTree;
use crate::llm::LlmCoordinator;
use crate::stats::StatsCollector;

/// Authoritative name source for final-code validation. The persistent
/// store implements this; the in-memory tree doubles as one in tests.
#[async_trait]
pub trait ClassifierLookup: Send + Sync {
    async fn lookup(&self, code: &str) -> Option<String>;
}

#[async_trait]
impl ClassifierLookup for ClassifierTree {
    async fn lookup(&self, code: &str) -> Option<String> {
        self.get(code).map(|n| n.name.clone())
    }
}

/// One accepted step of the walk.
#[derive(Debug, Clone)]
pub struct ClassifyStep {
    pub level: ClassifierLevel,
    pub selected_code: String,
    pub confidence: f64,
    pub reasoning: String,
    pub latency_ms: u64,
}

/// Result of a whole walk. `final_code` is empty when not even the section
/// level resolved.
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub final_code: String,
    pub final_name: String,
    pub final_confidence: f64,
    pub steps: Vec<ClassifyStep>,
    pub total_duration_ms: u64,
    pub ai_calls: u32,
}

impl ClassificationOutcome {
    fn empty() -> Self {
        Self {
            final_code: String::new(),
            final_name: String::new(),
            final_confidence: 0.0,
            steps: Vec::new(),
            total_duration_ms: 0,
            ai_calls: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Selection {
    selected_code: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

pub struct HierarchicalClassifier {
    tree: Arc<ClassifierTree>,
    coordinator: Arc<LlmCoordinator>,
    lookup: Arc<dyn ClassifierLookup>,
    stats: StatsCollector,
}

impl HierarchicalClassifier {
    pub fn new(
        tree: Arc<ClassifierTree>,
        coordinator: Arc<LlmCoordinator>,
        lookup: Arc<dyn ClassifierLookup>,
        stats: StatsCollector,
    ) -> Self {
        Self {
            tree,
            coordinator,
            lookup,
            stats,
        }
    }

    /// Classify one `(normalized_name, category)` pair.
    ///
    /// Never returns an error: every failure mode degrades into a partial
    /// (or empty) outcome with reduced confidence, and lands in the stats.
    pub async fn classify(&self, normalized_name: &str, category: &str) -> ClassificationOutcome {
        let t0 = std::time::Instant::now();
        let mut outcome = ClassificationOutcome::empty();
        let mut product = 1.0_f64;
        let mut current: Option<String> = None;
        let mut current_name: Option<String> = None;

        loop {
            let children = self.tree.children(current.as_deref());
            // Tolerate level-skipping trees: candidates are the shallowest
            // level actually present among the children.
            let Some(step_level) = children.iter().map(|n| n.level).min() else {
                break;
            };
            let candidates: Vec<_> = children
                .into_iter()
                .filter(|n| n.level == step_level)
                .collect();

            let (system, user) = build_level_prompt(
                normalized_name,
                category,
                current_name.as_deref(),
                step_level,
                &candidates,
            );

            let step_t0 = std::time::Instant::now();
            outcome.ai_calls += 1;
            let text = match self.coordinator.complete(&system, &user).await {
                Ok(text) => text,
                Err(err) => {
                    // Failure that survived the retry layer: terminate at
                    // the current code. Cancellation additionally halves the
                    // partial confidence. The coordinator already counted
                    // the error.
                    tracing::warn!(error = %err, code = current.as_deref().unwrap_or("<root>"),
                        "classifier walk: step call failed, terminating");
                    if outcome.steps.is_empty() {
                        product = 0.0;
                    } else if matches!(err, crate::llm::LlmError::Cancelled) {
                        product *= 0.5;
                    }
                    break;
                }
            };
            let latency_ms = step_t0.elapsed().as_millis() as u64;

            let selection = match parse_selection(&text) {
                Some(s) => s,
                None => {
                    self.stats
                        .record_error("ai_invalid_response", "unparseable classifier reply");
                    product = if outcome.steps.is_empty() { 0.0 } else { product * 0.5 };
                    break;
                }
            };

            let Some(chosen) = candidates
                .iter()
                .find(|n| n.code == selection.selected_code)
            else {
                // Valid JSON, but the code is not among the candidates.
                self.stats.record_error(
                    "ai_invalid_response",
                    format!("code {} not in candidate set", selection.selected_code),
                );
                product = if outcome.steps.is_empty() { 0.0 } else { product * 0.5 };
                break;
            };

            let confidence = selection.confidence.clamp(0.0, 1.0);
            product *= confidence;
            outcome.steps.push(ClassifyStep {
                level: step_level,
                selected_code: chosen.code.clone(),
                confidence,
                reasoning: selection.reasoning,
                latency_ms,
            });
            current_name = Some(chosen.name.clone());
            current = Some(chosen.code.clone());
        }

        outcome.final_code = current.unwrap_or_default();
        outcome.final_name = current_name.unwrap_or_default();
        outcome.final_confidence = if outcome.steps.is_empty() {
            0.0
        } else {
            product.clamp(0.0, 1.0)
        };

        // Store validation: the store name is authoritative on hit; a miss
        // halves the confidence and keeps the walk name.
        if !outcome.final_code.is_empty() {
            match self.lookup.lookup(&outcome.final_code).await {
                Some(name) => outcome.final_name = name,
                None => {
                    self.stats.record_error(
                        "kpved_not_found",
                        format!("classifier store has no code {}", outcome.final_code),
                    );
                    outcome.final_confidence *= 0.5;
                }
            }
        }

        outcome.total_duration_ms = t0.elapsed().as_millis() as u64;
        tracing::debug!(
            code = %outcome.final_code,
            confidence = outcome.final_confidence,
            steps = outcome.steps.len(),
            ai_calls = outcome.ai_calls,
            "classifier walk finished"
        );
        outcome
    }
}

/// Parse `{"selected_code", "confidence", "reasoning"}` out of a reply,
/// tolerating code fences and prose around the object. Out-of-range or
/// missing fields count as unparseable.
fn parse_selection(text: &str) -> Option<Selection> {
    let json = extract_json_object(text)?;
    let selection: Selection = serde_json::from_value(json).ok()?;
    if !(0.0..=1.0).contains(&selection.confidence) {
        return None;
    }
    if selection.selected_code.is_empty() {
        return None;
    }
    Some(selection)
}

/// First balanced `{...}` block in `text`.
fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&text[start..start + i + ch.len_utf8()]).ok();
                }
            }
            _ => {}
        }
    }
    None
}
