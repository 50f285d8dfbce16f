use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::blacklist::{
    BlacklistEntry, CreateOutcome, NewEntry,
    store::{BlacklistStore, Result},
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blacklist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email VARCHAR(320) NOT NULL UNIQUE,
    app_uuid VARCHAR(36) NOT NULL,
    blocked_reason VARCHAR(255),
    ip_address VARCHAR(64) NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_blacklist_app_uuid ON blacklist (app_uuid);
"#;

/// SQLite-backed blacklist store.
///
/// Uniqueness is enforced by the `UNIQUE` constraint on `email`; a plain
/// `INSERT` either wins or fails with a unique violation.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Opens a connection pool for `url`, creating the database file if missing.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;

        tracing::debug!(max_connections, "Connected to SQLite blacklist store");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BlacklistStore for SqlStore {
    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::info!("Blacklist schema is up to date");
        Ok(())
    }

    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO blacklist (email, app_uuid, blocked_reason, ip_address, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.email)
        .bind(&entry.app_uuid)
        .bind(&entry.blocked_reason)
        .bind(&entry.ip_address)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(CreateOutcome::Created {
                id: done.last_insert_rowid(),
                created_at,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            "SELECT id, email, app_uuid, blocked_reason, ip_address, created_at \
             FROM blacklist WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_store() -> SqlStore {
        // A single connection keeps every query on the same in-memory database.
        let store = SqlStore::connect("sqlite::memory:", 1).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn new_entry(email: &str, reason: Option<&str>) -> NewEntry {
        NewEntry {
            email: email.to_string(),
            app_uuid: "6f1c2f8e-8d4b-4c1e-9a55-0b0f6b1f3c11".to_string(),
            blocked_reason: reason.map(str::to_string),
            ip_address: "192.168.1.10".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sql_store_flow() {
        let store = create_test_store().await;

        let outcome = store
            .create(new_entry("user@test.com", Some("spam")))
            .await
            .unwrap();
        let CreateOutcome::Created { id, created_at } = outcome else {
            panic!("expected a new entry, got {outcome:?}");
        };

        let found = store.find_by_email("user@test.com").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.email, "user@test.com");
        assert_eq!(found.blocked_reason.as_deref(), Some("spam"));
        assert_eq!(found.ip_address, "192.168.1.10");
        assert!((found.created_at - created_at).num_milliseconds().abs() < 1);
    }

    #[tokio::test]
    async fn test_missing_reason_is_null() {
        let store = create_test_store().await;
        store.create(new_entry("quiet@test.com", None)).await.unwrap();

        let found = store.find_by_email("quiet@test.com").await.unwrap().unwrap();
        assert_eq!(found.blocked_reason, None);
    }

    #[tokio::test]
    async fn test_duplicate_is_not_an_error() {
        let store = create_test_store().await;
        store
            .create(new_entry("dup@test.com", Some("first")))
            .await
            .unwrap();

        let outcome = store
            .create(new_entry("dup@test.com", Some("second")))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blacklist WHERE email = ?")
            .bind("dup@test.com")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let found = store.find_by_email("dup@test.com").await.unwrap().unwrap();
        assert_eq!(found.blocked_reason.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let store = create_test_store().await;
        assert_eq!(store.find_by_email("ghost@test.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = create_test_store().await;
        store.migrate().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_persist_once() {
        let store = create_test_store().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.create(new_entry("race@test.com", None)).await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if let CreateOutcome::Created { .. } = handle.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
