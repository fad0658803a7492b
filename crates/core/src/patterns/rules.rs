// crates/core/src/patterns/rules.rs
//! Default pattern rule set, in registration order.

use regex_lite::Regex;

use super::{PatternRule, RuleMatcher, Severity};

fn erase(_matched: &str) -> String {
    String::new()
}

fn single_space(_matched: &str) -> String {
    " ".to_string()
}

/// The rules every detector starts with. Order matters only for stable
/// output; overlap resolution is severity/length based.
pub fn default_rules() -> Vec<PatternRule> {
    vec![
        // ER-00013004 and friends: short letter prefix, dash, long digit run
        PatternRule {
            rule_type: "technical_code",
            matcher: RuleMatcher::Pattern(
                Regex::new(r"[A-ZА-ЯЁ]{1,4}-\d{4,}").expect("static regex"),
            ),
            severity: Severity::High,
            auto_fixable: true,
            confidence: 0.9,
            fix: erase,
        },
        // арт. 12345 / art 12345 (ASCII-only case folding in regex-lite,
        // so Cyrillic variants are spelled out)
        PatternRule {
            rule_type: "article_reference",
            matcher: RuleMatcher::Pattern(
                Regex::new(r"(?:[Аа]рт|АРТ|[Aa]rt|ART)\.?\s*№?\s*\d+").expect("static regex"),
            ),
            severity: Severity::Medium,
            auto_fixable: true,
            confidence: 0.85,
            fix: erase,
        },
        // 100x100, 100х100х5, 2.5x4: dimensions living in the display name
        PatternRule {
            rule_type: "embedded_dimension",
            matcher: RuleMatcher::Pattern(
                Regex::new(
                    r"\d+(?:[.,]\d+)?\s*[xXхХ×]\s*\d+(?:[.,]\d+)?(?:\s*[xXхХ×]\s*\d+(?:[.,]\d+)?)?",
                )
                .expect("static regex"),
            ),
            severity: Severity::Low,
            auto_fixable: true,
            confidence: 0.8,
            fix: erase,
        },
        // Runs of three or more punctuation marks
        PatternRule {
            rule_type: "repeated_punctuation",
            matcher: RuleMatcher::Pattern(Regex::new(r"[-.,!?:;]{3,}").expect("static regex")),
            severity: Severity::Low,
            auto_fixable: true,
            confidence: 0.95,
            fix: single_space,
        },
        // The same token twice in a row, case-folded
        PatternRule {
            rule_type: "duplicate_token",
            matcher: RuleMatcher::Scan(duplicate_token_spans),
            severity: Severity::Low,
            auto_fixable: true,
            confidence: 0.7,
            fix: erase,
        },
        // Double spaces and friends
        PatternRule {
            rule_type: "extra_whitespace",
            matcher: RuleMatcher::Pattern(Regex::new(r"\s{2,}").expect("static regex")),
            severity: Severity::Low,
            auto_fixable: true,
            confidence: 0.99,
            fix: single_space,
        },
    ]
}

/// Byte spans of every second-of-a-pair duplicated word, including the
/// whitespace before it, so erasing the span removes the duplicate cleanly.
fn duplicate_token_spans(name: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut prev: Option<(usize, usize, String)> = None;

    let mut iter = name.char_indices().peekable();
    while let Some(&(start, c)) = iter.peek() {
        if c.is_whitespace() {
            iter.next();
            continue;
        }
        let mut end = start;
        while let Some(&(i, ch)) = iter.peek() {
            if ch.is_whitespace() {
                break;
            }
            end = i + ch.len_utf8();
            iter.next();
        }
        let word = name[start..end].to_lowercase();
        if let Some((_, prev_end, ref prev_word)) = prev {
            if *prev_word == word {
                spans.push((prev_end, end));
            }
        }
        prev = Some((start, end, word));
    }
    spans
}
