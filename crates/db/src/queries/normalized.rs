// crates/db/src/queries/normalized.rs
//! Normalized-item persistence: transactional batch inserts with their
//! attributes, dedup lookups, merged-count increments, tier updates.

use std::collections::HashMap;

use chrono::Utc;

use crate::{Database, DbResult};
use nomenorm_types::{AttributeTriple, NormalizedItem, ProcessingLevel};

#[derive(Debug, Clone)]
struct NormalizedRow {
    id: i64,
    source_reference: String,
    source_name: String,
    code: String,
    normalized_name: String,
    normalized_reference: String,
    category: String,
    merged_count: i64,
    ai_confidence: f64,
    ai_reasoning: String,
    processing_level: String,
    kpved_code: String,
    kpved_name: String,
    kpved_confidence: f64,
    quality_score: f64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for NormalizedRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            source_reference: row.try_get("source_reference")?,
            source_name: row.try_get("source_name")?,
            code: row.try_get("code")?,
            normalized_name: row.try_get("normalized_name")?,
            normalized_reference: row.try_get("normalized_reference")?,
            category: row.try_get("category")?,
            merged_count: row.try_get("merged_count")?,
            ai_confidence: row.try_get("ai_confidence")?,
            ai_reasoning: row.try_get("ai_reasoning")?,
            processing_level: row.try_get("processing_level")?,
            kpved_code: row.try_get("kpved_code")?,
            kpved_name: row.try_get("kpved_name")?,
            kpved_confidence: row.try_get("kpved_confidence")?,
            quality_score: row.try_get("quality_score")?,
        })
    }
}

/// A canonical row as stored, with its database id.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedItem {
    pub id: i64,
    pub item: NormalizedItem,
}

impl NormalizedRow {
    fn into_persisted(self) -> PersistedItem {
        PersistedItem {
            id: self.id,
            item: NormalizedItem {
                source_reference: self.source_reference,
                source_name: self.source_name,
                code: self.code,
                normalized_name: self.normalized_name,
                normalized_reference: self.normalized_reference,
                category: self.category,
                merged_count: self.merged_count.max(0) as u32,
                ai_confidence: self.ai_confidence,
                ai_reasoning: self.ai_reasoning,
                processing_level: ProcessingLevel::parse(&self.processing_level)
                    .unwrap_or(ProcessingLevel::Basic),
                kpved_code: self.kpved_code,
                kpved_name: self.kpved_name,
                kpved_confidence: self.kpved_confidence,
                quality_score: self.quality_score,
            },
        }
    }
}

const SELECT_COLUMNS: &str = "id, source_reference, source_name, code, normalized_name, \
     normalized_reference, category, merged_count, ai_confidence, ai_reasoning, \
     processing_level, kpved_code, kpved_name, kpved_confidence, quality_score";

impl Database {
    /// Insert a batch of canonical rows together with their attribute rows
    /// in one transaction: both commit or neither does. Returns the number
    /// of item rows written.
    pub async fn insert_normalized_with_attributes(
        &self,
        batch: &[NormalizedItem],
        attributes_by_code: &HashMap<String, Vec<AttributeTriple>>,
    ) -> DbResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let created_at = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;

        for item in batch {
            sqlx::query(
                r#"
                INSERT INTO normalized_items (
                    source_reference, source_name, code, normalized_name,
                    normalized_reference, category, merged_count, ai_confidence,
                    ai_reasoning, processing_level, kpved_code, kpved_name,
                    kpved_confidence, quality_score, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
            )
            .bind(&item.source_reference)
            .bind(&item.source_name)
            .bind(&item.code)
            .bind(&item.normalized_name)
            .bind(&item.normalized_reference)
            .bind(&item.category)
            .bind(item.merged_count as i64)
            .bind(item.ai_confidence)
            .bind(&item.ai_reasoning)
            .bind(item.processing_level.as_str())
            .bind(&item.kpved_code)
            .bind(&item.kpved_name)
            .bind(item.kpved_confidence)
            .bind(item.quality_score)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;

            if let Some(attributes) = attributes_by_code.get(&item.code) {
                for attribute in attributes {
                    sqlx::query(
                        "INSERT INTO item_attributes (item_code, attr_key, attr_value, attr_unit) \
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .bind(&item.code)
                    .bind(&attribute.key)
                    .bind(&attribute.value)
                    .bind(&attribute.unit)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(batch.len() as u64)
    }

    /// Exact-match lookup by normalized name, for dedup against persisted
    /// canonical rows. Chunked to stay under the SQLite parameter limit.
    pub async fn find_by_normalized_names(&self, names: &[String]) -> DbResult<Vec<PersistedItem>> {
        let mut found = Vec::new();
        for chunk in names.chunks(500) {
            if chunk.is_empty() {
                continue;
            }
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM normalized_items WHERE normalized_name IN ({placeholders})"
            );
            let mut query = sqlx::query_as::<_, NormalizedRow>(&sql);
            for name in chunk {
                query = query.bind(name);
            }
            let rows = query.fetch_all(self.pool()).await?;
            found.extend(rows.into_iter().map(NormalizedRow::into_persisted));
        }
        Ok(found)
    }

    /// Fold one more duplicate source row into a persisted canonical row.
    pub async fn increment_merged_count(&self, id: i64) -> DbResult<()> {
        self.increment_merged_count_by(id, 1).await
    }

    /// Fold several duplicate source rows at once (an outgoing canonical
    /// row that already represents a whole group).
    pub async fn increment_merged_count_by(&self, id: i64, delta: u32) -> DbResult<()> {
        sqlx::query("UPDATE normalized_items SET merged_count = merged_count + ?2 WHERE id = ?1")
            .bind(id)
            .bind(delta as i64)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record a tier promotion together with the score that earned it.
    pub async fn update_processing_tier(
        &self,
        id: i64,
        tier: ProcessingLevel,
        score: f64,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE normalized_items SET processing_level = ?2, quality_score = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(tier.as_str())
        .bind(score)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// One page of persisted items with `id > after_id`, for the quality
    /// post-pass.
    pub async fn fetch_normalized_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> DbResult<Vec<PersistedItem>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM normalized_items WHERE id > ? ORDER BY id ASC LIMIT ?"
        );
        let rows: Vec<NormalizedRow> = sqlx::query_as(&sql)
            .bind(after_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(NormalizedRow::into_persisted).collect())
    }

    pub async fn count_normalized(&self) -> DbResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM normalized_items")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 as u64)
    }

    /// Attribute rows for one item code, in insertion order.
    pub async fn attributes_for_code(&self, code: &str) -> DbResult<Vec<AttributeTriple>> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT attr_key, attr_value, attr_unit FROM item_attributes \
             WHERE item_code = ?1 ORDER BY id ASC",
        )
        .bind(code)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(key, value, unit)| AttributeTriple { key, value, unit })
            .collect())
    }
}
