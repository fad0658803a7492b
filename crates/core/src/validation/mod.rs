// crates/core/src/validation/mod.rs
//! Validation rule set and quality scoring for persisted items.
//!
//! Rules are pure: evaluating an item has no side effects. The pipeline's
//! post-pass applies tier promotion based on the score computed here.

mod rules;
pub mod suggestions;

pub use rules::{default_rules, ValidationRule};

use nomenorm_types::NormalizedItem;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Completeness,
    Accuracy,
    Consistency,
    Uniqueness,
    Format,
}

impl RuleCategory {
    /// Weight of this category in the quality score.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Completeness => 0.35,
            Self::Accuracy => 0.30,
            Self::Consistency => 0.20,
            Self::Format => 0.10,
            Self::Uniqueness => 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One failed rule on one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub rule_name: &'static str,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub recommendation: &'static str,
}

pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    pub fn with_rules(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn register(&mut self, rule: ValidationRule) {
        self.rules.push(rule);
    }

    /// All violations for one item, in rule registration order.
    pub fn validate(&self, item: &NormalizedItem) -> Vec<Violation> {
        self.rules
            .iter()
            .filter(|rule| (rule.applicable)(item) && !(rule.predicate)(item))
            .map(|rule| Violation {
                rule_name: rule.name,
                category: rule.category,
                severity: rule.severity,
                recommendation: rule.recommendation,
            })
            .collect()
    }

    /// Weighted fraction of passing rules, normalized to [0,1] over the
    /// categories that have at least one applicable rule for this item.
    pub fn quality_score(&self, item: &NormalizedItem) -> f64 {
        let mut passed_weight = 0.0;
        let mut total_weight = 0.0;

        for category in [
            RuleCategory::Completeness,
            RuleCategory::Accuracy,
            RuleCategory::Consistency,
            RuleCategory::Uniqueness,
            RuleCategory::Format,
        ] {
            let applicable: Vec<&ValidationRule> = self
                .rules
                .iter()
                .filter(|r| r.category == category && (r.applicable)(item))
                .collect();
            if applicable.is_empty() {
                continue;
            }
            let passing = applicable
                .iter()
                .filter(|r| (r.predicate)(item))
                .count() as f64;
            let weight = category.weight();
            total_weight += weight;
            passed_weight += weight * passing / applicable.len() as f64;
        }

        if total_weight == 0.0 {
            0.0
        } else {
            (passed_weight / total_weight).clamp(0.0, 1.0)
        }
    }
}
