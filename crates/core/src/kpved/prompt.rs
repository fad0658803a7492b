// crates/core/src/kpved/prompt.rs
//! Prompt construction for one classifier level.

use nomenorm_types::ClassifierLevel;

use super::tree::TreeNode;

/// Candidate list caps per level. Sections are few enough to always fit.
pub(crate) fn candidate_cap(level: ClassifierLevel) -> usize {
    match level {
        ClassifierLevel::Section => 40,
        ClassifierLevel::Class => 30,
        ClassifierLevel::Subclass => 25,
        ClassifierLevel::Group | ClassifierLevel::Subgroup => 20,
    }
}

const SYSTEM_PROMPT: &str = "\
Ты — эксперт по иерархическому классификатору промышленной продукции \
(КПВЭД). Твоя задача — выбрать ровно один код из предложенного списка \
кандидатов для позиции номенклатуры.

Правила:
1. Разделяй товары и услуги. Товар — физический предмет (болт, панель, \
компьютер). Услуга — работа или процесс (доставка, монтаж, ремонт, аренда). \
Пример-ловушка: «Монтаж панелей» — это услуга, а не панель; «Картридж для \
принтера» — это товар, а не услуга печати.
2. Не выбирай код по одному совпавшему слову. «Масло моторное» — не \
продукты питания; «Ключ гаечный» — не изделие для дверных замков.
3. Если ни один кандидат не подходит идеально, выбери ближайший по смыслу \
и снизь confidence.
4. Отвечай строго JSON-объектом без пояснений вокруг.";

/// Build `(system, user)` prompts for one step of the walk.
///
/// `parent_name` is the already-chosen node one level up; `None` at the
/// first step. Candidates beyond the per-level cap are dropped from the
/// list and summarized with an "и ещё N" suffix.
pub fn build_level_prompt(
    item_name: &str,
    category: &str,
    parent_name: Option<&str>,
    level: ClassifierLevel,
    candidates: &[&TreeNode],
) -> (String, String) {
    let cap = candidate_cap(level);
    let shown = candidates.len().min(cap);
    let hidden = candidates.len() - shown;

    let mut user = String::new();
    user.push_str(&format!(
        "Позиция: \"{item_name}\"\nКатегория по правилам: \"{category}\"\n"
    ));
    if let Some(parent) = parent_name {
        user.push_str(&format!("Выбранный уровень выше: \"{parent}\"\n"));
    }
    user.push_str(&format!(
        "\nКандидаты (уровень: {}):\n",
        level_label(level)
    ));
    for node in &candidates[..shown] {
        user.push_str(&format!("- {} — {}\n", node.code, node.name));
    }
    if hidden > 0 {
        user.push_str(&format!("… и ещё {hidden}\n"));
    }
    user.push_str(
        "\nОтветь JSON-объектом вида:\n\
         {\"selected_code\": \"<код из списка>\", \"confidence\": <0..1>, \
         \"reasoning\": \"<краткое обоснование>\"}",
    );

    (SYSTEM_PROMPT.to_string(), user)
}

fn level_label(level: ClassifierLevel) -> &'static str {
    match level {
        ClassifierLevel::Section => "секция",
        ClassifierLevel::Class => "класс",
        ClassifierLevel::Subclass => "подкласс",
        ClassifierLevel::Group => "группа",
        ClassifierLevel::Subgroup => "подгруппа",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpved::tree::{record, ClassifierTree};

    fn tree_with_classes(n: usize) -> ClassifierTree {
        let mut records = vec![record("C", "Промышленность", None)];
        for i in 0..n {
            let code = format!("{:02}", 10 + i);
            records.push(record(&code, &format!("Класс {code}"), Some("C")));
        }
        ClassifierTree::from_records(records).expect("valid tree")
    }

    #[test]
    fn test_prompt_contains_context_and_schema() {
        let tree = tree_with_classes(3);
        let candidates = tree.children(Some("C"));
        let (system, user) = build_level_prompt(
            "компьютер",
            "электроника",
            Some("Промышленность"),
            ClassifierLevel::Class,
            &candidates,
        );
        assert!(system.contains("услуга"));
        assert!(user.contains("Позиция: \"компьютер\""));
        assert!(user.contains("Выбранный уровень выше: \"Промышленность\""));
        assert!(user.contains("- 10 — Класс 10"));
        assert!(user.contains("selected_code"));
        assert!(!user.contains("и ещё"));
    }

    #[test]
    fn test_candidate_list_truncated_with_suffix() {
        let tree = tree_with_classes(35);
        let candidates = tree.children(Some("C"));
        let (_, user) = build_level_prompt(
            "компьютер",
            "электроника",
            None,
            ClassifierLevel::Class,
            &candidates,
        );
        // Cap at class level is 30; five remain hidden
        assert!(user.contains("… и ещё 5"));
        assert!(user.contains("- 39 —")); // last shown (10..=39)
        assert!(!user.contains("- 40 —"));
    }

    #[test]
    fn test_caps_per_level() {
        assert_eq!(candidate_cap(ClassifierLevel::Class), 30);
        assert_eq!(candidate_cap(ClassifierLevel::Subclass), 25);
        assert_eq!(candidate_cap(ClassifierLevel::Group), 20);
        assert_eq!(candidate_cap(ClassifierLevel::Subgroup), 20);
    }
}
