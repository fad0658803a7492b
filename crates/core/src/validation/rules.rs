// crates/core/src/validation/rules.rs
//! The default rule set (~12 rules across five categories).

use nomenorm_types::{NormalizedItem, ProcessingLevel};

use super::{RuleCategory, RuleSeverity};

/// A validation rule: descriptor plus plain predicate functions.
/// `applicable` gates the rule; `predicate` returns true when it passes.
pub struct ValidationRule {
    pub name: &'static str,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub recommendation: &'static str,
    pub applicable: fn(&NormalizedItem) -> bool,
    pub predicate: fn(&NormalizedItem) -> bool,
}

fn always(_item: &NormalizedItem) -> bool {
    true
}

fn has_kpved(item: &NormalizedItem) -> bool {
    !item.kpved_code.is_empty()
}

fn is_ai_enhanced(item: &NormalizedItem) -> bool {
    matches!(
        item.processing_level,
        ProcessingLevel::AiEnhanced | ProcessingLevel::Benchmark
    ) && item.ai_confidence > 0.0
}

/// `NN.N`, `NN.NN`, `NN.NN.N(N)`: two-digit head, dotted numeric tail.
fn kpved_shape_ok(code: &str) -> bool {
    let parts: Vec<&str> = code.split('.').collect();
    if !(2..=3).contains(&parts.len()) {
        return false;
    }
    if parts[0].len() != 2 {
        return false;
    }
    parts
        .iter()
        .all(|p| (1..=2).contains(&p.len()) && p.chars().all(|c| c.is_ascii_digit()))
}

pub fn default_rules() -> Vec<ValidationRule> {
    vec![
        // -- completeness ----------------------------------------------------
        ValidationRule {
            name: "required_fields",
            category: RuleCategory::Completeness,
            severity: RuleSeverity::Critical,
            recommendation: "заполнить normalized_name, source_reference и категорию",
            applicable: always,
            predicate: |item| {
                !item.normalized_name.trim().is_empty()
                    && !item.source_reference.trim().is_empty()
                    && !item.category.trim().is_empty()
            },
        },
        ValidationRule {
            name: "kpved_present",
            category: RuleCategory::Completeness,
            severity: RuleSeverity::Warning,
            recommendation: "прогнать позицию через классификатор",
            applicable: always,
            predicate: has_kpved,
        },
        ValidationRule {
            name: "reference_mirrors_name",
            category: RuleCategory::Completeness,
            severity: RuleSeverity::Error,
            recommendation: "пересчитать normalized_reference из normalized_name",
            applicable: always,
            predicate: |item| item.normalized_reference == item.normalized_name,
        },
        // -- format ----------------------------------------------------------
        ValidationRule {
            name: "kpved_format",
            category: RuleCategory::Format,
            severity: RuleSeverity::Error,
            recommendation: "код КПВЭД должен иметь вид NN.NN или NN.NN.N",
            applicable: has_kpved,
            predicate: |item| kpved_shape_ok(&item.kpved_code),
        },
        ValidationRule {
            name: "name_length",
            category: RuleCategory::Format,
            severity: RuleSeverity::Warning,
            recommendation: "нормализованное имя должно быть от 3 до 100 символов",
            applicable: always,
            predicate: |item| {
                let len = item.normalized_name.chars().count();
                (3..=100).contains(&len)
            },
        },
        ValidationRule {
            name: "name_has_letter",
            category: RuleCategory::Format,
            severity: RuleSeverity::Error,
            recommendation: "имя из одних цифр и знаков — вернуть на переобработку",
            applicable: always,
            predicate: |item| item.normalized_name.chars().any(|c| c.is_alphabetic()),
        },
        ValidationRule {
            name: "name_is_lowercase",
            category: RuleCategory::Format,
            severity: RuleSeverity::Info,
            recommendation: "канонизировать регистр нормализованного имени",
            applicable: always,
            predicate: |item| !item.normalized_name.chars().any(|c| c.is_uppercase()),
        },
        // -- consistency -----------------------------------------------------
        ValidationRule {
            name: "category_resolved",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Warning,
            recommendation: "категория \"other\" — дополнить словарь или включить ИИ-уточнение",
            applicable: always,
            predicate: |item| item.category != "other",
        },
        ValidationRule {
            name: "ai_reasoning_present",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Warning,
            recommendation: "ИИ-обработанная позиция должна хранить обоснование",
            applicable: is_ai_enhanced,
            predicate: |item| !item.ai_reasoning.trim().is_empty(),
        },
        ValidationRule {
            name: "confidence_in_range",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Error,
            recommendation: "confidence-поля обязаны лежать в [0,1]",
            applicable: always,
            predicate: |item| {
                (0.0..=1.0).contains(&item.ai_confidence)
                    && (0.0..=1.0).contains(&item.kpved_confidence)
            },
        },
        // -- accuracy --------------------------------------------------------
        ValidationRule {
            name: "kpved_confidence_floor",
            category: RuleCategory::Accuracy,
            severity: RuleSeverity::Warning,
            recommendation: "классификация с confidence < 0.7 — на ручную проверку",
            applicable: has_kpved,
            predicate: |item| item.kpved_confidence >= 0.7,
        },
        ValidationRule {
            name: "ai_confidence_floor",
            category: RuleCategory::Accuracy,
            severity: RuleSeverity::Warning,
            recommendation: "ИИ-результат с confidence < 0.8 — на ручную проверку",
            applicable: is_ai_enhanced,
            predicate: |item| item.ai_confidence >= 0.8,
        },
        // -- uniqueness ------------------------------------------------------
        ValidationRule {
            name: "merged_count_positive",
            category: RuleCategory::Uniqueness,
            severity: RuleSeverity::Critical,
            recommendation: "merged_count не может быть меньше 1",
            applicable: always,
            predicate: |item| item.merged_count >= 1,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_count_and_categories() {
        let rules = default_rules();
        assert_eq!(rules.len(), 13);
        assert!(rules.iter().any(|r| r.category == RuleCategory::Uniqueness));
        assert!(rules.iter().any(|r| r.category == RuleCategory::Accuracy));
    }

    #[test]
    fn test_kpved_shape() {
        assert!(kpved_shape_ok("26.20"));
        assert!(kpved_shape_ok("26.2"));
        assert!(kpved_shape_ok("26.20.1"));
        assert!(kpved_shape_ok("26.20.11"));
        assert!(!kpved_shape_ok("26"));
        assert!(!kpved_shape_ok("C"));
        assert!(!kpved_shape_ok("26."));
        assert!(!kpved_shape_ok("2.20"));
        assert!(!kpved_shape_ok("26.20.11.1"));
        assert!(!kpved_shape_ok("ab.cd"));
    }
}
