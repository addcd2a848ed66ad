//! SQLite-backed tender document store
//!
//! Each tender is stored as a JSON document alongside the natural-key columns
//! that the unique index enforces.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::repositories::{
    CategoryGroup, InsertOutcome, StoreError, StoreResult, TenderHighlights, TenderRepository,
    TenderSearchCriteria,
};
use crate::domain::tender::{
    NOT_AVAILABLE, STORED_DATETIME_FORMAT, TenderField, TenderKey, TenderRecord,
};

/// Keys sortable besides the mapped tender fields
const EXTRA_SORT_KEYS: [&str; 2] = ["tender_url", "created_at"];

/// Separates the searchable values inside `search_text`
const SEARCH_SEPARATOR: &str = "\u{1f}";

fn decode_row(row: &SqliteRow) -> StoreResult<TenderRecord> {
    let document: String = row.try_get("document")?;
    Ok(serde_json::from_str(&document)?)
}

/// Lowercased title, reference number and tender id
///
/// Folded here rather than with SQLite's `lower()`, which only folds ASCII.
fn search_text(record: &TenderRecord, key: &TenderKey) -> String {
    [
        record.text(TenderField::TenderTitle).unwrap_or_default(),
        key.reference_number_column(),
        key.tender_id_column(),
    ]
    .map(str::to_lowercase)
    .join(SEARCH_SEPARATOR)
}

#[derive(Clone)]
pub struct SqliteTenderRepository {
    pool: Arc<SqlitePool>,
    collection: String,
}

impl SqliteTenderRepository {
    /// `collection` must already be migrated, see `DatabaseConnection::migrate`
    pub fn new(pool: Arc<SqlitePool>, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    fn document_json(record: &TenderRecord, id: &str) -> StoreResult<String> {
        let mut document = serde_json::to_value(record)?;
        if let Some(map) = document.as_object_mut() {
            map.insert("_id".to_string(), serde_json::Value::String(id.to_string()));
        }
        Ok(serde_json::to_string(&document)?)
    }

    /// Insert statement, optionally ignoring key conflicts
    fn insert_sql(&self, ignore_duplicates: bool) -> String {
        let conflict = if ignore_duplicates {
            " ON CONFLICT(tender_id, tender_reference_number) DO NOTHING"
        } else {
            ""
        };
        format!(
            "INSERT INTO {} (id, tender_id, tender_reference_number, tender_title, search_text, tender_url, document, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?){}",
            self.collection, conflict
        )
    }

    async fn insert(&self, record: &TenderRecord, ignore_duplicates: bool) -> StoreResult<u64> {
        let id = Uuid::new_v4().to_string();
        let key = record.key();
        let document = Self::document_json(record, &id)?;

        let result = sqlx::query(&self.insert_sql(ignore_duplicates))
            .bind(id.as_str())
            .bind(key.tender_id_column())
            .bind(key.reference_number_column())
            .bind(record.text(TenderField::TenderTitle))
            .bind(search_text(record, &key))
            .bind(record.tender_url())
            .bind(document)
            .bind(Utc::now())
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// SQL expression to order by, for a validated sort key
    fn sort_expression(sort_by: &str) -> StoreResult<String> {
        if sort_by == "created_at" {
            return Ok("created_at".to_string());
        }
        if TenderField::from_key(sort_by).is_some() || EXTRA_SORT_KEYS.contains(&sort_by) {
            return Ok(format!("json_extract(document, '$.{sort_by}')"));
        }
        Err(StoreError::InvalidCriteria(format!(
            "unknown sort key '{sort_by}'"
        )))
    }

    async fn category_groups(&self, limit: u32) -> StoreResult<Vec<CategoryGroup>> {
        let counts_sql = format!(
            "SELECT json_extract(document, '$.tender_category') AS category, COUNT(*) AS total \
             FROM {} GROUP BY category ORDER BY total DESC, category ASC",
            self.collection
        );
        let mut groups = Vec::new();
        for row in sqlx::query(&counts_sql).fetch_all(&*self.pool).await? {
            let total: i64 = row.try_get("total")?;
            groups.push(CategoryGroup {
                category: row.try_get("category")?,
                count: u64::try_from(total).unwrap_or_default(),
                tenders: Vec::new(),
            });
        }

        let members_sql = format!(
            "SELECT category, document FROM ( \
                 SELECT json_extract(document, '$.tender_category') AS category, document, \
                        ROW_NUMBER() OVER ( \
                            PARTITION BY json_extract(document, '$.tender_category') \
                            ORDER BY rowid ASC) AS position \
                 FROM {}) \
             WHERE position <= ?1 \
             ORDER BY position ASC",
            self.collection
        );
        let rows = sqlx::query(&members_sql)
            .bind(i64::from(limit))
            .fetch_all(&*self.pool)
            .await?;
        for row in rows {
            let category: Option<String> = row.try_get("category")?;
            let record = decode_row(&row)?;
            if let Some(group) = groups.iter_mut().find(|g| g.category == category) {
                group.tenders.push(record);
            }
        }

        Ok(groups)
    }

    async fn reaching_deadline(&self, limit: u32, now: NaiveDateTime) -> StoreResult<Vec<TenderRecord>> {
        let deadline = format!(
            "json_extract(document, '$.{}')",
            TenderField::BidSubmissionEndDate.as_key()
        );
        let sql = format!(
            "SELECT document FROM {collection} \
             WHERE {deadline} IS NOT NULL AND {deadline} <> ?1 AND {deadline} >= ?2 \
             ORDER BY {deadline} ASC, id ASC \
             LIMIT ?3",
            collection = self.collection
        );
        sqlx::query(&sql)
            .bind(NOT_AVAILABLE)
            .bind(now.format(STORED_DATETIME_FORMAT).to_string())
            .bind(i64::from(limit))
            .fetch_all(&*self.pool)
            .await?
            .iter()
            .map(decode_row)
            .collect()
    }

    async fn best_valued(&self, limit: u32) -> StoreResult<Vec<TenderRecord>> {
        let sql = format!(
            "SELECT document FROM {} \
             WHERE json_type(document, '$.{value}') = 'integer' \
             ORDER BY json_extract(document, '$.{value}') DESC, id ASC \
             LIMIT ?1",
            self.collection,
            value = TenderField::TenderValue.as_key()
        );
        sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&*self.pool)
            .await?
            .iter()
            .map(decode_row)
            .collect()
    }
}

/// `%term%`, lowercased, with LIKE wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl TenderRepository for SqliteTenderRepository {
    async fn find_one(&self, key: &TenderKey) -> StoreResult<Option<TenderRecord>> {
        let sql = format!(
            "SELECT document FROM {} WHERE tender_id = ? AND tender_reference_number = ? LIMIT 1",
            self.collection
        );
        let row = sqlx::query(&sql)
            .bind(key.tender_id_column())
            .bind(key.reference_number_column())
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn insert_one(&self, record: &TenderRecord) -> StoreResult<()> {
        self.insert(record, false).await?;
        Ok(())
    }

    async fn insert_if_absent(&self, record: &TenderRecord) -> StoreResult<InsertOutcome> {
        let inserted = self.insert(record, true).await?;
        Ok(if inserted == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn search(&self, criteria: &TenderSearchCriteria) -> StoreResult<Vec<TenderRecord>> {
        if criteria.page == 0 || criteria.quantity == 0 {
            return Err(StoreError::InvalidCriteria(
                "page and quantity must be at least 1".to_string(),
            ));
        }

        let order = Self::sort_expression(&criteria.sort_by)?;
        let direction = if criteria.descending { "DESC" } else { "ASC" };
        let pattern = criteria
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(like_pattern);

        let sql = format!(
            "SELECT document FROM {} \
             WHERE ?1 IS NULL OR search_text LIKE ?1 ESCAPE '\\' \
             ORDER BY {} {}, id ASC \
             LIMIT ?2 OFFSET ?3",
            self.collection, order, direction
        );

        let offset = i64::from(criteria.page - 1) * i64::from(criteria.quantity);
        let rows = sqlx::query(&sql)
            .bind(pattern)
            .bind(i64::from(criteria.quantity))
            .bind(offset)
            .fetch_all(&*self.pool)
            .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn count(&self) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", self.collection);
        let total: i64 = sqlx::query(&sql)
            .fetch_one(&*self.pool)
            .await?
            .try_get("total")?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn highlights(&self, limit: u32, now: NaiveDateTime) -> StoreResult<TenderHighlights> {
        Ok(TenderHighlights {
            by_category: self.category_groups(limit).await?,
            reaching_deadline: self.reaching_deadline(limit, now).await?,
            best_valued: self.best_valued(limit).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tender::FieldValue;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use rstest::rstest;
    use tempfile::TempDir;

    async fn repository() -> (SqliteTenderRepository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("tenders.db").display());
        let db = DatabaseConnection::new(&url, 2).await.unwrap();
        db.migrate("tender").await.unwrap();
        let repo = SqliteTenderRepository::new(Arc::new(db.pool().clone()), "tender");
        (repo, dir)
    }

    fn tender(id: Option<&str>, reference: Option<&str>, title: &str) -> TenderRecord {
        let mut record = TenderRecord::new(format!("https://etenders.gov.in/eprocure/app?t={title}"));
        if let Some(id) = id {
            record.set(TenderField::TenderId, FieldValue::Text(id.to_string()));
        }
        if let Some(reference) = reference {
            record.set(TenderField::TenderReferenceNumber, FieldValue::Text(reference.to_string()));
        }
        record.set(TenderField::TenderTitle, FieldValue::Text(title.to_string()));
        record
    }

    #[tokio::test]
    async fn insert_if_absent_reports_duplicates() {
        let (repo, _dir) = repository().await;
        let record = tender(Some("2024_1"), Some("REF/1"), "Road works");

        assert_eq!(repo.insert_if_absent(&record).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.insert_if_absent(&record).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_id_with_different_reference_is_distinct() {
        let (repo, _dir) = repository().await;
        repo.insert_if_absent(&tender(Some("2024_1"), Some("REF/1"), "A")).await.unwrap();
        let outcome = repo
            .insert_if_absent(&tender(Some("2024_1"), Some("REF/2"), "B"))
            .await
            .unwrap();

        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_key_halves_collide() {
        let (repo, _dir) = repository().await;
        repo.insert_if_absent(&tender(None, None, "First")).await.unwrap();
        let outcome = repo.insert_if_absent(&tender(None, None, "Second")).await.unwrap();

        assert_eq!(outcome, InsertOutcome::Duplicate);
    }

    #[tokio::test]
    async fn insert_one_rejects_existing_key() {
        let (repo, _dir) = repository().await;
        let record = tender(Some("2024_1"), Some("REF/1"), "Road works");
        repo.insert_one(&record).await.unwrap();

        assert!(matches!(repo.insert_one(&record).await, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn find_one_returns_stored_document() {
        let (repo, _dir) = repository().await;
        let record = tender(Some("2024_1"), Some("REF/1"), "Road works");
        repo.insert_one(&record).await.unwrap();

        let found = repo.find_one(&TenderKey::new("2024_1", "REF/1")).await.unwrap();
        assert_eq!(found, Some(record));

        let missing = repo.find_one(&TenderKey::new("2024_1", "REF/9")).await.unwrap();
        assert!(missing.is_none());
    }

    #[rstest]
    #[case(Some("road"), vec!["Road works"])]
    #[case(Some("REF/2"), vec!["Bridge repair"])]
    #[case(Some("2024_3"), vec!["Canal lining"])]
    #[case(Some("50%"), vec![])]
    #[case(None, vec!["Bridge repair", "Canal lining", "Road works"])]
    #[tokio::test]
    async fn search_matches_title_reference_and_id(
        #[case] term: Option<&str>,
        #[case] expected: Vec<&str>,
    ) {
        let (repo, _dir) = repository().await;
        repo.insert_one(&tender(Some("2024_1"), Some("REF/1"), "Road works")).await.unwrap();
        repo.insert_one(&tender(Some("2024_2"), Some("REF/2"), "Bridge repair")).await.unwrap();
        repo.insert_one(&tender(Some("2024_3"), Some("REF/3"), "Canal lining")).await.unwrap();

        let criteria = TenderSearchCriteria {
            search: term.map(ToString::to_string),
            ..Default::default()
        };
        let titles: Vec<String> = repo
            .search(&criteria)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.text(TenderField::TenderTitle).map(ToString::to_string))
            .collect();

        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn search_pages_in_requested_order() {
        let (repo, _dir) = repository().await;
        for (i, title) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            let id = format!("2024_{i}");
            repo.insert_one(&tender(Some(&id), Some("REF"), title)).await.unwrap();
        }

        let criteria = TenderSearchCriteria {
            page: 2,
            quantity: 2,
            descending: true,
            ..Default::default()
        };
        let titles: Vec<String> = repo
            .search(&criteria)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.text(TenderField::TenderTitle).map(ToString::to_string))
            .collect();

        assert_eq!(titles, vec!["C", "B"]);
    }

    #[rstest]
    #[case("document; DROP TABLE tender")]
    #[case("unknown_key")]
    #[tokio::test]
    async fn unknown_sort_key_is_rejected(#[case] sort_by: &str) {
        let (repo, _dir) = repository().await;
        let criteria = TenderSearchCriteria {
            sort_by: sort_by.to_string(),
            ..Default::default()
        };

        assert!(matches!(repo.search(&criteria).await, Err(StoreError::InvalidCriteria(_))));
    }

    #[rstest]
    #[case("école")]
    #[case("ÉCOLE")]
    #[case("École Road")]
    #[tokio::test]
    async fn search_folds_non_ascii_case(#[case] term: &str) {
        let (repo, _dir) = repository().await;
        repo.insert_one(&tender(Some("2024_1"), Some("REF/1"), "ÉCOLE ROAD")).await.unwrap();
        repo.insert_one(&tender(Some("2024_2"), Some("REF/2"), "Canal lining")).await.unwrap();

        let criteria = TenderSearchCriteria {
            search: Some(term.to_string()),
            ..Default::default()
        };
        let hits = repo.search(&criteria).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text(TenderField::TenderTitle), Some("ÉCOLE ROAD"));
    }

    #[tokio::test]
    async fn date_shaped_text_survives_the_store() {
        let (repo, _dir) = repository().await;
        let mut record = tender(Some("2024_1"), Some("REF/1"), "Road works");
        record.set(
            TenderField::WorkDescription,
            FieldValue::Text("2024-01-05T14:30:00".to_string()),
        );
        repo.insert_one(&record).await.unwrap();

        let back = repo.find_one(&TenderKey::new("2024_1", "REF/1")).await.unwrap();
        assert_eq!(back, Some(record));
    }

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    fn highlighted(
        id: &str,
        category: Option<&str>,
        value: i64,
        deadline: Option<NaiveDateTime>,
    ) -> TenderRecord {
        let mut record = tender(Some(id), Some("REF"), id);
        if let Some(category) = category {
            record.set(TenderField::TenderCategory, FieldValue::Text(category.to_string()));
        }
        record.set(TenderField::TenderValue, FieldValue::Integer(value));
        record.set(
            TenderField::BidSubmissionEndDate,
            deadline.map_or(FieldValue::NotAvailable, FieldValue::DateTime),
        );
        record
    }

    fn ids(records: &[TenderRecord]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.text(TenderField::TenderId))
            .collect()
    }

    #[tokio::test]
    async fn highlights_group_rank_and_limit() {
        let (repo, _dir) = repository().await;
        for record in [
            highlighted("w1", Some("Works"), 500, Some(at(2030, 3, 1))),
            highlighted("w2", Some("Works"), 9_000, Some(at(2030, 1, 15))),
            highlighted("w3", Some("Works"), 100, Some(at(2020, 1, 1))),
            highlighted("g1", Some("Goods"), 7_500, None),
            highlighted("s1", None, 0, Some(at(2030, 2, 1))),
        ] {
            repo.insert_one(&record).await.unwrap();
        }

        let highlights = repo.highlights(2, at(2025, 1, 1)).await.unwrap();

        let groups: Vec<(Option<&str>, u64, Vec<&str>)> = highlights
            .by_category
            .iter()
            .map(|g| (g.category.as_deref(), g.count, ids(&g.tenders)))
            .collect();
        assert_eq!(
            groups,
            vec![
                (Some("Works"), 3, vec!["w1", "w2"]),
                (None, 1, vec!["s1"]),
                (Some("Goods"), 1, vec!["g1"]),
            ]
        );
        assert_eq!(ids(&highlights.reaching_deadline), vec!["w2", "s1"]);
        assert_eq!(ids(&highlights.best_valued), vec!["w2", "g1"]);
    }

    #[tokio::test]
    async fn highlights_of_empty_store_are_empty() {
        let (repo, _dir) = repository().await;
        let highlights = repo.highlights(20, at(2025, 1, 1)).await.unwrap();
        assert_eq!(highlights, TenderHighlights::default());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_Off"), "%50\\%\\_off%");
    }
}
