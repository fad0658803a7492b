// crates/core/src/categorizer.rs
//! Keyword-dictionary categorizer.
//!
//! Maps a cleaned item name to a coarse domain category. Matching is
//! whole-word and case-insensitive; a keyword may be a short phrase, which
//! must appear as consecutive words. Categories are scanned in lexicographic
//! order so the tie-break is deterministic.

use std::collections::BTreeMap;

/// Category returned when nothing matches (or the input is blank).
pub const FALLBACK_CATEGORY: &str = "other";

pub struct RuleCategorizer {
    /// category -> normalized keywords, iterated in lexicographic key order.
    categories: BTreeMap<String, Vec<String>>,
}

impl RuleCategorizer {
    /// Build from an explicit dictionary. Keywords are case-folded once here.
    pub fn new(dictionary: BTreeMap<String, Vec<String>>) -> Self {
        let categories = dictionary
            .into_iter()
            .map(|(category, keywords)| {
                let normalized = keywords
                    .into_iter()
                    .map(|k| normalize_words(&k))
                    .filter(|k| !k.is_empty())
                    .collect();
                (category, normalized)
            })
            .collect();
        Self { categories }
    }

    /// Default dictionary for the 1C catalog domain.
    pub fn with_defaults() -> Self {
        let mut dict: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let entries: [(&str, &[&str]); 8] = [
            (
                "инструмент",
                &[
                    "молоток",
                    "отвертка",
                    "дрель",
                    "пила",
                    "стамеска",
                    "плоскогубцы",
                    "ключ гаечный",
                    "уровень",
                    "рулетка",
                ],
            ),
            (
                "стройматериалы",
                &[
                    "панель", "кирпич", "цемент", "гипсокартон", "профиль", "плита", "брус",
                    "доска", "лист",
                ],
            ),
            (
                "электроника",
                &[
                    "компьютер",
                    "монитор",
                    "ноутбук",
                    "принтер",
                    "клавиатура",
                    "кабель",
                    "мышь",
                ],
            ),
            (
                "канцтовары",
                &["бумага", "ручка", "карандаш", "степлер", "скрепка", "папка"],
            ),
            (
                "сантехника",
                &["труба", "кран", "смеситель", "фитинг", "муфта", "сифон"],
            ),
            (
                "химия",
                &["краска", "растворитель", "клей", "герметик", "грунтовка", "эмаль"],
            ),
            (
                "спецодежда",
                &["перчатки", "каска", "халат", "респиратор", "сапоги", "комбинезон"],
            ),
            (
                "продукты",
                &["молоко", "хлеб", "сахар", "чай", "кофе", "масло"],
            ),
        ];
        for (category, keywords) in entries {
            dict.insert(
                category.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            );
        }
        Self::new(dict)
    }

    /// Categorize a cleaned name. Empty or whitespace-only input returns
    /// [`FALLBACK_CATEGORY`]. First matching category in lexicographic order
    /// wins.
    pub fn categorize(&self, cleaned_name: &str) -> &str {
        let haystack = normalize_words(cleaned_name);
        if haystack.is_empty() {
            return FALLBACK_CATEGORY;
        }
        // Pad with spaces so a " keyword " containment check is exactly a
        // whole-word (or whole-phrase) match.
        let padded = format!(" {haystack} ");
        for (category, keywords) in &self.categories {
            for keyword in keywords {
                if padded.contains(&format!(" {keyword} ")) {
                    return category;
                }
            }
        }
        FALLBACK_CATEGORY
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(|s| s.as_str())
    }
}

/// Case-fold and reduce to space-separated alphanumeric words.
fn normalize_words(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_match() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize("молоток большой"), "инструмент");
        assert_eq!(cat.categorize("панель металлическая"), "стройматериалы");
        assert_eq!(cat.categorize("компьютер"), "электроника");
    }

    #[test]
    fn test_case_insensitive() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize("МОЛОТОК"), "инструмент");
    }

    #[test]
    fn test_whole_word_only() {
        let mut dict = BTreeMap::new();
        dict.insert("tools".to_string(), vec!["hammer".to_string()]);
        let cat = RuleCategorizer::new(dict);
        assert_eq!(cat.categorize("hammer drill"), "tools");
        // Substring inside a word must not count
        assert_eq!(cat.categorize("jackhammering"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_phrase_keyword() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize("ключ гаечный 17"), "инструмент");
        // Words present but not consecutive
        assert_eq!(cat.categorize("ключ для гаечный"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_empty_input() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize(""), FALLBACK_CATEGORY);
        assert_eq!(cat.categorize("   "), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_no_match() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize("загадочный предмет"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_tie_break_is_lexicographic() {
        let mut dict = BTreeMap::new();
        dict.insert("b-cat".to_string(), vec!["болт".to_string()]);
        dict.insert("a-cat".to_string(), vec!["болт".to_string()]);
        let cat = RuleCategorizer::new(dict);
        // Both match; lexicographically first category wins
        assert_eq!(cat.categorize("болт оцинкованный"), "a-cat");
    }

    #[test]
    fn test_punctuation_does_not_block_match() {
        let cat = RuleCategorizer::with_defaults();
        assert_eq!(cat.categorize("краска, белая"), "химия");
    }
}
