//! Repository interfaces for tender persistence
//!
//! The store is treated as a document collection keyed by the tender's
//! natural key (`tender_id`, `tender_reference_number`).

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tender::{TenderKey, TenderRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document encoding error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an atomic insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Free-text search over stored tenders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenderSearchCriteria {
    /// Case-insensitive containment on title, reference number and tender id
    pub search: Option<String>,
    /// 1-based page number
    pub page: u32,
    pub quantity: u32,
    /// Stored key to sort by
    pub sort_by: String,
    pub descending: bool,
}

impl Default for TenderSearchCriteria {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            quantity: 10,
            sort_by: "tender_title".to_string(),
            descending: false,
        }
    }
}

/// Stored tenders sharing one `tender_category`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    /// `None` groups tenders without a category
    pub category: Option<String>,
    pub count: u64,
    /// In insertion order, at most the requested limit
    pub tenders: Vec<TenderRecord>,
}

/// Read-only overview of the stored collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenderHighlights {
    /// Largest groups first
    pub by_category: Vec<CategoryGroup>,
    /// Open tenders, earliest bid submission deadline first
    pub reaching_deadline: Vec<TenderRecord>,
    /// Highest `tender_value` first
    pub best_valued: Vec<TenderRecord>,
}

#[async_trait]
pub trait TenderRepository: Send + Sync {
    /// Look up a stored tender by its natural key
    async fn find_one(&self, key: &TenderKey) -> StoreResult<Option<TenderRecord>>;

    /// Insert without a duplicate check. Pairing this with `find_one` is not
    /// atomic: when two callers both miss, the second insert fails with
    /// `StoreError::Database` on the unique key.
    async fn insert_one(&self, record: &TenderRecord) -> StoreResult<()>;

    /// Insert unless a tender with the same natural key is already stored
    async fn insert_if_absent(&self, record: &TenderRecord) -> StoreResult<InsertOutcome>;

    async fn search(&self, criteria: &TenderSearchCriteria) -> StoreResult<Vec<TenderRecord>>;

    async fn count(&self) -> StoreResult<u64>;

    /// Category groups, upcoming deadlines and best-valued tenders, each list
    /// holding at most `limit` tenders. Deadlines are compared against `now`.
    async fn highlights(&self, limit: u32, now: NaiveDateTime) -> StoreResult<TenderHighlights>;
}
