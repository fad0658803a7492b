// crates/db/src/queries/raw.rs
//! Raw-item reads. The source table and column names come from the 1C
//! export configuration, so they are parameters rather than literals,
//! validated as bare identifiers before interpolation.

use crate::{Database, DbError, DbResult};
use nomenorm_types::RawItem;

/// Where and how to read the raw export.
#[derive(Debug, Clone)]
pub struct RawTableSpec {
    pub table: String,
    pub ref_col: String,
    pub code_col: String,
    pub name_col: String,
}

impl Default for RawTableSpec {
    fn default() -> Self {
        Self {
            table: "nomenclature_raw".to_string(),
            ref_col: "reference".to_string(),
            code_col: "code".to_string(),
            name_col: "name".to_string(),
        }
    }
}

impl RawTableSpec {
    fn validate(&self) -> DbResult<()> {
        for ident in [&self.table, &self.ref_col, &self.code_col, &self.name_col] {
            if !is_bare_identifier(ident) {
                return Err(DbError::InvalidIdentifier(ident.clone()));
            }
        }
        Ok(())
    }
}

fn is_bare_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Database {
    /// One page of raw items with `id > after_id`, ascending by id. Paging
    /// in id order is what makes checkpoint resume deterministic.
    pub async fn fetch_raw_page(
        &self,
        spec: &RawTableSpec,
        after_id: i64,
        limit: i64,
    ) -> DbResult<Vec<RawItem>> {
        spec.validate()?;
        let sql = format!(
            "SELECT id, {ref_col}, {code_col}, {name_col} FROM {table} \
             WHERE id > ? ORDER BY id ASC LIMIT ?",
            ref_col = spec.ref_col,
            code_col = spec.code_col,
            name_col = spec.name_col,
            table = spec.table,
        );
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(&sql)
            .bind(after_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, reference, code, name)| RawItem {
                id,
                reference,
                code,
                name,
            })
            .collect())
    }

    pub async fn count_raw_items(&self, spec: &RawTableSpec) -> DbResult<u64> {
        spec.validate()?;
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", spec.table))
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 as u64)
    }

    /// Test/demo helper: load raw rows into the default raw table.
    pub async fn seed_raw_items(&self, items: &[RawItem]) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        for item in items {
            sqlx::query(
                "INSERT INTO nomenclature_raw (id, reference, code, name) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(item.id)
            .bind(&item.reference)
            .bind(&item.code)
            .bind(&item.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: i64, name: &str) -> RawItem {
        RawItem {
            id,
            reference: format!("ref-{id}"),
            code: format!("c{id}"),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_paging_in_id_order() {
        let db = Database::new_in_memory().await.expect("db");
        db.seed_raw_items(&[raw(3, "три"), raw(1, "один"), raw(2, "два")])
            .await
            .expect("seed");

        let spec = RawTableSpec::default();
        assert_eq!(db.count_raw_items(&spec).await.unwrap(), 3);

        let page = db.fetch_raw_page(&spec, 0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 1);
        assert_eq!(page[1].id, 2);

        let rest = db.fetch_raw_page(&spec, 2, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "три");
    }

    #[tokio::test]
    async fn test_resume_skips_processed_ids() {
        let db = Database::new_in_memory().await.expect("db");
        db.seed_raw_items(&(1..=5).map(|i| raw(i, "x")).collect::<Vec<_>>())
            .await
            .expect("seed");
        let page = db
            .fetch_raw_page(&RawTableSpec::default(), 3, 10)
            .await
            .unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_malicious_identifier_rejected() {
        let db = Database::new_in_memory().await.expect("db");
        let spec = RawTableSpec {
            table: "nomenclature_raw; DROP TABLE normalized_items".to_string(),
            ..RawTableSpec::default()
        };
        let err = db.fetch_raw_page(&spec, 0, 10).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }
}
