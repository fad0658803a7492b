// crates/pipeline/src/dedup.rs
//! Duplicate scoring against persisted canonical rows.
//!
//! The similarity function is swappable: the default stays lexical (exact
//! normalized-name equality, then token-set Jaccard within the same
//! category). Any pair at or above [`DUPLICATE_THRESHOLD`] is a duplicate.

use std::collections::HashSet;

use nomenorm_types::NormalizedItem;

/// Score at or above which a pair is a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.95;

pub trait DuplicateScorer: Send + Sync {
    /// Similarity of an outgoing row against a persisted one, in [0,1].
    fn score(&self, candidate: &NormalizedItem, existing: &NormalizedItem) -> f64;
}

/// Default scorer: exact lowercased equality scores 1.0; a token-set
/// Jaccard of at least 0.9 within the same category maps linearly onto
/// 0.95..0.99; everything else is below threshold.
pub struct LexicalScorer;

impl DuplicateScorer for LexicalScorer {
    fn score(&self, candidate: &NormalizedItem, existing: &NormalizedItem) -> f64 {
        let a = candidate.normalized_name.to_lowercase();
        let b = existing.normalized_name.to_lowercase();
        if a == b {
            return 1.0;
        }
        if candidate.category != existing.category {
            return 0.0;
        }
        let jaccard = token_set_jaccard(&a, &b);
        if jaccard >= 0.9 {
            0.95 + (jaccard - 0.9) * 0.4
        } else {
            0.0
        }
    }
}

/// Jaccard similarity of the whitespace-token sets of two strings.
pub fn token_set_jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
