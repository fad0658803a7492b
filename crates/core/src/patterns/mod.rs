// crates/core/src/patterns/mod.rs
//! Lexical pattern detection over raw names.
//!
//! Scans for problematic fragments a 1C export drags along: technical
//! codes, article references, dimensions embedded in the display name,
//! runaway punctuation, duplicated tokens. Each registered rule reports
//! matches with a suggested fix; [`PatternDetector::apply_fixes`] applies
//! the auto-fixable ones from the end of the string backwards so earlier
//! indices stay valid.
//!
//! All positions and lengths are character offsets (see the tokenizer).

mod rules;

pub use rules::default_rules;

use regex_lite::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// How a rule finds its spans. Scan functions return byte ranges over the
/// input; conversion to character offsets happens in the detector.
pub enum RuleMatcher {
    Pattern(Regex),
    Scan(fn(&str) -> Vec<(usize, usize)>),
}

/// A registered pattern rule. Plain data plus plain function fields; new
/// rules are added by appending at construction time.
pub struct PatternRule {
    pub rule_type: &'static str,
    pub matcher: RuleMatcher,
    pub severity: Severity,
    pub auto_fixable: bool,
    pub confidence: f64,
    pub fix: fn(&str) -> String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub rule_type: String,
    /// Character offset of the match start.
    pub start: usize,
    /// Match length in characters.
    pub length: usize,
    pub matched_text: String,
    pub suggested_fix: String,
    pub confidence: f64,
    pub severity: Severity,
    pub auto_fixable: bool,
}

impl PatternMatch {
    fn end(&self) -> usize {
        self.start + self.length
    }

    fn overlaps(&self, other: &PatternMatch) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

pub struct PatternDetector {
    rules: Vec<PatternRule>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    /// Detector with the default rule set.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Detector with an explicit ordered rule list.
    pub fn with_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn register(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    /// Run every rule over `name` and resolve overlaps.
    ///
    /// Overlapping matches: higher severity wins; at equal severity the
    /// longer match wins; at equal length the earlier one. Survivors are
    /// returned in ascending start order.
    pub fn detect(&self, name: &str) -> Vec<PatternMatch> {
        let mut candidates = Vec::new();
        for rule in &self.rules {
            for (byte_start, byte_end) in matcher_spans(&rule.matcher, name) {
                let matched = &name[byte_start..byte_end];
                candidates.push(PatternMatch {
                    rule_type: rule.rule_type.to_string(),
                    start: name[..byte_start].chars().count(),
                    length: matched.chars().count(),
                    matched_text: matched.to_string(),
                    suggested_fix: (rule.fix)(matched),
                    confidence: rule.confidence,
                    severity: rule.severity,
                    auto_fixable: rule.auto_fixable,
                });
            }
        }

        // Priority order: severity desc, length desc, start asc. Greedily
        // keep matches that do not overlap an already-kept one.
        candidates.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.length.cmp(&a.length))
                .then(a.start.cmp(&b.start))
        });
        let mut kept: Vec<PatternMatch> = Vec::new();
        for candidate in candidates {
            if !kept.iter().any(|k| k.overlaps(&candidate)) {
                kept.push(candidate);
            }
        }
        kept.sort_by_key(|m| m.start);
        kept
    }

    /// Apply the auto-fixable matches to `name`, in descending start order
    /// so earlier offsets stay valid, then collapse whitespace and trim.
    pub fn apply_fixes(&self, name: &str, matches: &[PatternMatch]) -> String {
        let mut chars: Vec<char> = name.chars().collect();
        let mut fixable: Vec<&PatternMatch> = matches.iter().filter(|m| m.auto_fixable).collect();
        fixable.sort_by(|a, b| b.start.cmp(&a.start));
        for m in fixable {
            if m.end() > chars.len() {
                continue;
            }
            let replacement: Vec<char> = m.suggested_fix.chars().collect();
            chars.splice(m.start..m.end(), replacement);
        }
        let rebuilt: String = chars.into_iter().collect();
        rebuilt.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn matcher_spans(matcher: &RuleMatcher, name: &str) -> Vec<(usize, usize)> {
    match matcher {
        RuleMatcher::Pattern(re) => re.find_iter(name).map(|m| (m.start(), m.end())).collect(),
        RuleMatcher::Scan(f) => f(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_code_position_in_chars() {
        let detector = PatternDetector::new();
        let matches = detector.detect("Товар ER-00013004 100x100");
        let code = matches
            .iter()
            .find(|m| m.rule_type == "technical_code")
            .expect("technical_code match");
        assert_eq!(code.start, 6);
        assert_eq!(code.length, 11);
        assert_eq!(code.matched_text, "ER-00013004");
    }

    #[test]
    fn test_fixes_strip_code_and_dimension() {
        let detector = PatternDetector::new();
        let input = "Товар ER-00013004 100x100";
        let matches = detector.detect(input);
        let fixed = detector.apply_fixes(input, &matches);
        assert_eq!(fixed, "Товар");
        // Second pass finds nothing
        assert!(detector.detect(&fixed).is_empty());
    }

    #[test]
    fn test_apply_fixes_is_stable() {
        let detector = PatternDetector::new();
        for input in [
            "Товар ER-00013004 100x100",
            "Гвоздь арт. 12345 оцинкованный",
            "Клей........момент",
            "болт болт М10",
        ] {
            let once = detector.apply_fixes(input, &detector.detect(input));
            let twice = detector.apply_fixes(&once, &detector.detect(&once));
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn test_article_reference() {
        let detector = PatternDetector::new();
        let matches = detector.detect("Гвоздь арт. 12345 оцинкованный");
        assert!(matches.iter().any(|m| m.rule_type == "article_reference"));
        let fixed = detector.apply_fixes("Гвоздь арт. 12345 оцинкованный", &matches);
        assert_eq!(fixed, "Гвоздь оцинкованный");
    }

    #[test]
    fn test_repeated_punctuation() {
        let detector = PatternDetector::new();
        let matches = detector.detect("Клей........момент");
        assert!(matches.iter().any(|m| m.rule_type == "repeated_punctuation"));
        let fixed = detector.apply_fixes("Клей........момент", &matches);
        assert_eq!(fixed, "Клей момент");
    }

    #[test]
    fn test_duplicate_token() {
        let detector = PatternDetector::new();
        let matches = detector.detect("болт болт М10");
        let dup = matches
            .iter()
            .find(|m| m.rule_type == "duplicate_token")
            .expect("duplicate_token match");
        assert!(dup.auto_fixable);
        let fixed = detector.apply_fixes("болт болт М10", &matches);
        assert_eq!(fixed, "болт М10");
    }

    #[test]
    fn test_duplicate_token_case_folded() {
        let detector = PatternDetector::new();
        let matches = detector.detect("Болт болт М10");
        assert!(matches.iter().any(|m| m.rule_type == "duplicate_token"));
    }

    #[test]
    fn test_clean_name_has_no_matches() {
        let detector = PatternDetector::new();
        assert!(detector.detect("Молоток большой").is_empty());
    }

    #[test]
    fn test_overlap_same_severity_keeps_longer() {
        // Two Low-severity rules produce overlapping spans; the longer wins.
        fn spans_short(s: &str) -> Vec<(usize, usize)> {
            s.find("abc").map(|i| vec![(i, i + 3)]).unwrap_or_default()
        }
        fn spans_long(s: &str) -> Vec<(usize, usize)> {
            s.find("abcde").map(|i| vec![(i, i + 5)]).unwrap_or_default()
        }
        fn erase(_: &str) -> String {
            String::new()
        }
        let detector = PatternDetector::with_rules(vec![
            PatternRule {
                rule_type: "short",
                matcher: RuleMatcher::Scan(spans_short),
                severity: Severity::Low,
                auto_fixable: true,
                confidence: 0.5,
                fix: erase,
            },
            PatternRule {
                rule_type: "long",
                matcher: RuleMatcher::Scan(spans_long),
                severity: Severity::Low,
                auto_fixable: true,
                confidence: 0.5,
                fix: erase,
            },
        ]);
        let matches = detector.detect("xx abcde yy");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_type, "long");
    }

    #[test]
    fn test_overlap_higher_severity_wins() {
        fn spans_all(s: &str) -> Vec<(usize, usize)> {
            if s.is_empty() {
                vec![]
            } else {
                vec![(0, s.len())]
            }
        }
        fn spans_prefix(s: &str) -> Vec<(usize, usize)> {
            if s.len() >= 2 {
                vec![(0, 2)]
            } else {
                vec![]
            }
        }
        fn erase(_: &str) -> String {
            String::new()
        }
        let detector = PatternDetector::with_rules(vec![
            PatternRule {
                rule_type: "whole",
                matcher: RuleMatcher::Scan(spans_all),
                severity: Severity::Low,
                auto_fixable: false,
                confidence: 0.5,
                fix: erase,
            },
            PatternRule {
                rule_type: "prefix",
                matcher: RuleMatcher::Scan(spans_prefix),
                severity: Severity::High,
                auto_fixable: false,
                confidence: 0.5,
                fix: erase,
            },
        ]);
        let matches = detector.detect("abcdef");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_type, "prefix");
    }

    #[test]
    fn test_extra_whitespace_collapsed() {
        let detector = PatternDetector::new();
        let input = "Молоток    большой";
        let matches = detector.detect(input);
        assert!(matches.iter().any(|m| m.rule_type == "extra_whitespace"));
        assert_eq!(detector.apply_fixes(input, &matches), "Молоток большой");
    }
}
