// crates/db/src/queries/classifier.rs
//! Classifier-tree load and lookup.

use async_trait::async_trait;

use crate::{Database, DbResult};
use nomenorm_core::ClassifierLookup;
use nomenorm_types::{ClassifierLevel, ClassifierRecord};

impl Database {
    /// Every classifier node, for building the in-memory tree at startup.
    /// Rows whose level string is unknown fall back to code-shape inference;
    /// rows where both fail are skipped with a warning.
    pub async fn load_classifier_records(&self) -> DbResult<Vec<ClassifierRecord>> {
        let rows: Vec<(String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT code, name, parent_code, level FROM kpved_classifier ORDER BY code ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (code, name, parent_code, level) in rows {
            let level = parse_level(&level).or_else(|| ClassifierLevel::from_code(&code));
            match level {
                Some(level) => records.push(ClassifierRecord {
                    code,
                    name,
                    parent_code,
                    level,
                }),
                None => {
                    tracing::warn!(code = %code, "classifier row with unrecognizable level, skipping");
                }
            }
        }
        Ok(records)
    }

    /// Authoritative name for a code, or `None` when absent.
    pub async fn lookup_classifier(&self, code: &str) -> DbResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM kpved_classifier WHERE code = ?1")
                .bind(code)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(name,)| name))
    }

    /// Load classifier nodes (startup seeding and tests).
    pub async fn seed_classifier(&self, records: &[ClassifierRecord]) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        for record in records {
            sqlx::query(
                "INSERT OR REPLACE INTO kpved_classifier (code, name, parent_code, level) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&record.code)
            .bind(&record.name)
            .bind(&record.parent_code)
            .bind(record.level.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn parse_level(s: &str) -> Option<ClassifierLevel> {
    match s {
        "section" => Some(ClassifierLevel::Section),
        "class" => Some(ClassifierLevel::Class),
        "subclass" => Some(ClassifierLevel::Subclass),
        "group" => Some(ClassifierLevel::Group),
        "subgroup" => Some(ClassifierLevel::Subgroup),
        _ => None,
    }
}

/// Store-backed [`ClassifierLookup`] for walk validation. Lookup errors
/// surface as "not found": the walk degrades confidence instead of failing.
pub struct StoreLookup {
    db: Database,
}

impl StoreLookup {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClassifierLookup for StoreLookup {
    async fn lookup(&self, code: &str) -> Option<String> {
        match self.db.lookup_classifier(code).await {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(error = %err, code = %code, "classifier lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, name: &str, parent: Option<&str>) -> ClassifierRecord {
        ClassifierRecord {
            code: code.to_string(),
            name: name.to_string(),
            parent_code: parent.map(|s| s.to_string()),
            level: ClassifierLevel::from_code(code).expect("valid code"),
        }
    }

    #[tokio::test]
    async fn test_seed_load_roundtrip() {
        let db = Database::new_in_memory().await.expect("db");
        db.seed_classifier(&[
            record("C", "Промышленность", None),
            record("26", "Электроника", Some("C")),
            record("26.2", "Компьютеры", Some("26")),
        ])
        .await
        .expect("seed");

        let records = db.load_classifier_records().await.expect("load");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].code, "26"); // sorted by code, digits before letters
        assert_eq!(records[2].level, ClassifierLevel::Section);
    }

    #[tokio::test]
    async fn test_lookup() {
        let db = Database::new_in_memory().await.expect("db");
        db.seed_classifier(&[record("26", "Электроника", None)])
            .await
            .expect("seed");

        assert_eq!(
            db.lookup_classifier("26").await.expect("lookup"),
            Some("Электроника".to_string())
        );
        assert_eq!(db.lookup_classifier("99").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn test_store_lookup_trait() {
        let db = Database::new_in_memory().await.expect("db");
        db.seed_classifier(&[record("26", "Электроника", None)])
            .await
            .expect("seed");
        let lookup = StoreLookup::new(db);
        assert_eq!(lookup.lookup("26").await, Some("Электроника".to_string()));
        assert_eq!(lookup.lookup("99").await, None);
    }
}
