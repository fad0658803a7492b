// crates/pipeline/src/grouping.rs
//! In-memory grouping of equivalent items during one driver run.
//!
//! The grouping map is owned exclusively by the driver; nothing else
//! observes it mid-run. A group is keyed by `(category, normalized_name)`
//! and its classifier result is assigned exactly once, when the group is
//! created; every item that later joins the group shares it.

use std::collections::HashMap;

use nomenorm_core::ClassificationOutcome;
use nomenorm_types::{AttributeTriple, GroupKey, NormalizedItem, ProcessingLevel, RawItem};

/// An accepted LLM refinement of one item's normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRefinement {
    pub normalized_name: String,
    pub category: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Everything accumulated for one group during a run.
#[derive(Debug, Default)]
pub struct GroupValue {
    pub items: Vec<RawItem>,
    pub classification: Option<ClassificationOutcome>,
    pub ai: Option<AiRefinement>,
    /// item code -> extracted attributes, for the attribute writer.
    pub attributes_by_code: HashMap<String, Vec<AttributeTriple>>,
}

#[derive(Default)]
pub struct GroupingEngine {
    groups: HashMap<GroupKey, GroupValue>,
    items_since_drain: u64,
}

impl GroupingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one item under its key. Returns `true` when this created the
    /// group (the caller then classifies it).
    pub fn insert(
        &mut self,
        key: GroupKey,
        item: RawItem,
        attributes: Vec<AttributeTriple>,
        ai: Option<AiRefinement>,
    ) -> bool {
        self.items_since_drain += 1;
        let is_new = !self.groups.contains_key(&key);
        let group = self.groups.entry(key).or_default();
        if is_new {
            group.ai = ai;
        }
        if !attributes.is_empty() {
            group
                .attributes_by_code
                .entry(item.code.clone())
                .or_default()
                .extend(attributes);
        }
        group.items.push(item);
        is_new
    }

    /// Attach the classifier result to a freshly created group, rewriting
    /// the group category when the classifier disagrees confidently and the
    /// rewrite would not collide with an existing group. Returns the
    /// effective key.
    pub fn assign_classification(
        &mut self,
        key: &GroupKey,
        outcome: ClassificationOutcome,
        min_confidence: f64,
    ) -> GroupKey {
        // First result wins; a group is never re-classified.
        if let Some(group) = self.groups.get(key) {
            if group.classification.is_some() {
                return key.clone();
            }
        }

        let rewrite = !outcome.final_name.is_empty()
            && outcome.final_name != key.category
            && outcome.final_confidence >= min_confidence;

        if rewrite {
            let new_key = GroupKey::new(outcome.final_name.clone(), key.normalized_name.clone());
            if !self.groups.contains_key(&new_key) {
                if let Some(mut group) = self.groups.remove(key) {
                    tracing::debug!(
                        from = %key.category,
                        to = %new_key.category,
                        name = %key.normalized_name,
                        "group category rewritten from classifier"
                    );
                    group.classification = Some(outcome);
                    self.groups.insert(new_key.clone(), group);
                    return new_key;
                }
            }
        }

        if let Some(group) = self.groups.get_mut(key) {
            group.classification = Some(outcome);
        }
        key.clone()
    }

    /// Number of items inserted since the last drain.
    pub fn pending_items(&self) -> u64 {
        self.items_since_drain
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Take everything, resetting the engine for the next batch window.
    pub fn drain(&mut self) -> Vec<(GroupKey, GroupValue)> {
        self.items_since_drain = 0;
        let mut drained: Vec<(GroupKey, GroupValue)> = self.groups.drain().collect();
        // Deterministic flush order regardless of hash iteration
        drained.sort_by(|(a, _), (b, _)| {
            a.normalized_name
                .cmp(&b.normalized_name)
                .then(a.category.cmp(&b.category))
        });
        drained
    }
}

/// Fold one drained group into its canonical row. The first item donates
/// the source fields; `merged_count` is the group size.
pub fn build_canonical(key: &GroupKey, value: &GroupValue) -> Option<NormalizedItem> {
    let first = value.items.first()?;
    let mut item = NormalizedItem::basic(first, &key.normalized_name, &key.category);
    item.merged_count = value.items.len() as u32;

    if let Some(ai) = &value.ai {
        item.ai_confidence = ai.confidence;
        item.ai_reasoning = ai.reasoning.clone();
        item.processing_level = ProcessingLevel::AiEnhanced;
    }
    if let Some(classification) = &value.classification {
        item.kpved_code = classification.final_code.clone();
        item.kpved_name = classification.final_name.clone();
        item.kpved_confidence = classification.final_confidence;
    }
    Some(item)
}
