// crates/core/src/validation/suggestions.rs
//! Derives recommended fixes from rule violations. Suggestions are data
//! only; nothing here mutates an item.

use serde::Serialize;

use super::{RuleSeverity, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    SetValue,
    CorrectFormat,
    Reprocess,
    Merge,
    Review,
}

/// A recommended fix. `priority` 1 is most urgent; `estimated_impact` is
/// the expected quality-score gain if applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub rule_name: &'static str,
    pub message: &'static str,
    pub priority: u8,
    pub estimated_impact: f64,
}

/// Map violations to suggestions, most urgent first.
pub fn derive_suggestions(violations: &[Violation]) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = violations
        .iter()
        .map(|violation| {
            let kind = kind_for(violation.rule_name);
            Suggestion {
                kind,
                rule_name: violation.rule_name,
                message: violation.recommendation,
                priority: priority_for(violation.severity),
                estimated_impact: impact_for(violation),
            }
        })
        .collect();
    suggestions.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.estimated_impact.partial_cmp(&a.estimated_impact).unwrap_or(std::cmp::Ordering::Equal))
    });
    suggestions
}

fn kind_for(rule_name: &str) -> SuggestionKind {
    match rule_name {
        "required_fields" | "reference_mirrors_name" => SuggestionKind::SetValue,
        "kpved_format" | "name_is_lowercase" | "confidence_in_range" => {
            SuggestionKind::CorrectFormat
        }
        "kpved_present" | "name_has_letter" | "category_resolved" | "name_length" => {
            SuggestionKind::Reprocess
        }
        "merged_count_positive" => SuggestionKind::Merge,
        _ => SuggestionKind::Review,
    }
}

fn priority_for(severity: RuleSeverity) -> u8 {
    match severity {
        RuleSeverity::Critical => 1,
        RuleSeverity::Error => 2,
        RuleSeverity::Warning => 3,
        RuleSeverity::Info => 4,
    }
}

fn impact_for(violation: &Violation) -> f64 {
    // A failed rule costs a share of its category weight; use the full
    // weight as the upper-bound estimate.
    violation.category.weight()
}
