use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::blacklist::{
    BlacklistEntry, CreateOutcome, NewEntry,
    store::{BlacklistStore, Result},
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blacklist (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(320) NOT NULL UNIQUE,
    app_uuid VARCHAR(36) NOT NULL,
    blocked_reason VARCHAR(255),
    ip_address VARCHAR(64) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_blacklist_app_uuid ON blacklist (app_uuid);
"#;

/// PostgreSQL-backed blacklist store.
///
/// `INSERT .. ON CONFLICT (email) DO NOTHING` lets the `UNIQUE` constraint
/// pick the single winner among concurrent inserts.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;

        tracing::debug!(max_connections, "Connected to PostgreSQL blacklist store");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BlacklistStore for PgStore {
    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::info!("Blacklist schema is up to date");
        Ok(())
    }

    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome> {
        let created_at = Utc::now();
        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO blacklist (email, app_uuid, blocked_reason, ip_address, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id",
        )
        .bind(&entry.email)
        .bind(&entry.app_uuid)
        .bind(&entry.blocked_reason)
        .bind(&entry.ip_address)
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match id {
            Some(id) => CreateOutcome::Created { id, created_at },
            None => CreateOutcome::AlreadyExists,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            "SELECT id, email, app_uuid, blocked_reason, ip_address, created_at \
             FROM blacklist WHERE email = $1",
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
