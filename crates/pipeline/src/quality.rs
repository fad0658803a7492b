// crates/pipeline/src/quality.rs
//! Quality post-pass: re-score persisted items and promote the ones that
//! clear the benchmark threshold.

use nomenorm_core::{StatsCollector, Validator};
use nomenorm_db::{Database, DbResult};
use nomenorm_types::ProcessingLevel;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub scored: u64,
    pub promoted: u64,
    pub mean_score: f64,
}

/// Page over every persisted item, compute its quality score, and promote
/// in place when `score >= threshold` and the item is not already at
/// benchmark tier. Rule evaluation itself has no side effects; the only
/// write is the promotion.
pub async fn run_quality_pass(
    db: &Database,
    validator: &Validator,
    stats: &StatsCollector,
    threshold: f64,
    page_size: i64,
) -> DbResult<QualityReport> {
    let mut report = QualityReport::default();
    let mut total_score = 0.0;
    let mut after_id = 0i64;

    loop {
        let page = db.fetch_normalized_page(after_id, page_size).await?;
        if page.is_empty() {
            break;
        }
        for persisted in page {
            after_id = persisted.id;
            let score = validator.quality_score(&persisted.item);
            report.scored += 1;
            total_score += score;
            stats.record_quality(score);

            if score >= threshold
                && persisted.item.processing_level != ProcessingLevel::Benchmark
            {
                db.update_processing_tier(persisted.id, ProcessingLevel::Benchmark, score)
                    .await?;
                stats.record_tier(ProcessingLevel::Benchmark);
                report.promoted += 1;
            }
        }
    }

    report.mean_score = if report.scored == 0 {
        0.0
    } else {
        total_score / report.scored as f64
    };
    info!(
        scored = report.scored,
        promoted = report.promoted,
        mean_score = report.mean_score,
        "quality pass finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomenorm_types::{NormalizedItem, RawItem};
    use std::collections::HashMap;

    fn item(code: &str, normalized_name: &str, category: &str) -> NormalizedItem {
        let raw = RawItem {
            id: 1,
            reference: format!("ref-{code}"),
            code: code.to_string(),
            name: normalized_name.to_string(),
        };
        let mut item = NormalizedItem::basic(&raw, normalized_name, category);
        item.kpved_code = "25.73".to_string();
        item.kpved_name = "Инструмент".to_string();
        item.kpved_confidence = 0.85;
        item
    }

    #[tokio::test]
    async fn test_promotion_and_mean() {
        let db = Database::new_in_memory().await.expect("db");
        // One clean item (will clear 0.9), one with an unresolved category
        // (will not).
        let mut weak = item("c2", "загадка", "other");
        weak.kpved_code = String::new();
        weak.kpved_confidence = 0.0;
        db.insert_normalized_with_attributes(
            &[item("c1", "молоток большой", "инструмент"), weak],
            &HashMap::new(),
        )
        .await
        .expect("insert");

        let stats = StatsCollector::new();
        let report = run_quality_pass(&db, &Validator::new(), &stats, 0.9, 10)
            .await
            .expect("quality pass");

        assert_eq!(report.scored, 2);
        assert_eq!(report.promoted, 1);
        assert!(report.mean_score > 0.0 && report.mean_score < 1.0);

        let rows = db.fetch_normalized_page(0, 10).await.expect("page");
        let strong = rows
            .iter()
            .find(|r| r.item.normalized_name == "молоток большой")
            .expect("strong row");
        assert_eq!(strong.item.processing_level, ProcessingLevel::Benchmark);
        assert!(strong.item.quality_score >= 0.9);
        let weak = rows
            .iter()
            .find(|r| r.item.normalized_name == "загадка")
            .expect("weak row");
        assert_eq!(weak.item.processing_level, ProcessingLevel::Basic);
    }

    #[tokio::test]
    async fn test_second_pass_is_stable() {
        let db = Database::new_in_memory().await.expect("db");
        db.insert_normalized_with_attributes(
            &[item("c1", "молоток большой", "инструмент")],
            &HashMap::new(),
        )
        .await
        .expect("insert");

        let stats = StatsCollector::new();
        let validator = Validator::new();
        let first = run_quality_pass(&db, &validator, &stats, 0.9, 10)
            .await
            .expect("first pass");
        assert_eq!(first.promoted, 1);

        // Already at benchmark: nothing more to promote
        let second = run_quality_pass(&db, &validator, &stats, 0.9, 10)
            .await
            .expect("second pass");
        assert_eq!(second.promoted, 0);
        assert_eq!(second.scored, 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let db = Database::new_in_memory().await.expect("db");
        let report = run_quality_pass(&db, &Validator::new(), &StatsCollector::new(), 0.9, 10)
            .await
            .expect("pass");
        assert_eq!(report.scored, 0);
        assert_eq!(report.mean_score, 0.0);
    }
}
