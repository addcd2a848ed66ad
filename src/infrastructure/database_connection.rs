// Database connection and pool management
// Tender documents live in a single SQLite table named after the configured collection

use anyhow::{Result, bail};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

use crate::infrastructure::config::StoreConfig;

/// On-disk file behind a SQLite URL, without any `?` connection options.
/// `None` for in-memory databases.
fn database_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);

    (!path.is_empty() && !path.starts_with(":memory:")).then_some(path)
}

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        if let Some(db_path) = database_file_path(database_url) {
            let path = Path::new(db_path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !path.exists() {
                tokio::fs::File::create(path).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(&config.database_url, config.max_connections).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the collection table and its key index if missing
    ///
    /// A missing key half is stored as '' so that two records both lacking it
    /// still collide on the unique index.
    pub async fn migrate(&self, collection: &str) -> Result<()> {
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("Invalid collection name: {collection:?}");
        }

        let create_table_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {collection} (
                id TEXT PRIMARY KEY,
                tender_id TEXT NOT NULL DEFAULT '',
                tender_reference_number TEXT NOT NULL DEFAULT '',
                tender_title TEXT,
                search_text TEXT NOT NULL DEFAULT '',
                tender_url TEXT NOT NULL,
                document TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        );

        let create_key_index_sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{collection}_key \
             ON {collection} (tender_id, tender_reference_number)"
        );

        let create_title_index_sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{collection}_title ON {collection} (tender_title)"
        );

        sqlx::query(&create_table_sql).execute(&self.pool).await?;
        sqlx::query(&create_key_index_sql).execute(&self.pool).await?;
        sqlx::query(&create_title_index_sql).execute(&self.pool).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url, 2).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn connection_options_are_not_part_of_the_file_name() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("options.db");
        let database_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let db = DatabaseConnection::new(&database_url, 1).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        for entry in std::fs::read_dir(temp_dir.path())? {
            assert!(!entry?.file_name().to_string_lossy().contains('?'));
        }
        Ok(())
    }

    #[test]
    fn in_memory_urls_have_no_file() {
        assert_eq!(database_file_path("sqlite::memory:"), None);
        assert_eq!(database_file_path("sqlite::memory:?cache=shared"), None);
        assert_eq!(database_file_path("sqlite://data/t.db?mode=rwc"), Some("data/t.db"));
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("migration.db").display());

        let db = DatabaseConnection::new(&database_url, 2).await?;
        db.migrate("tender").await?;
        // Idempotent
        db.migrate("tender").await?;

        let table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='tender'")
            .fetch_optional(db.pool())
            .await?;
        assert!(table.is_some());

        let index = sqlx::query("SELECT name FROM sqlite_master WHERE type='index' AND name='idx_tender_key'")
            .fetch_optional(db.pool())
            .await?;
        assert!(index.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_unsafe_collection_name() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await?;
        assert!(db.migrate("tender; DROP TABLE x").await.is_err());
        Ok(())
    }
}
