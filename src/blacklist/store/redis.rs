use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{
    AsyncCommands, Client as RedisClient,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::blacklist::{
    BlacklistEntry, CreateOutcome, NewEntry,
    store::{BlacklistStore, Result},
};

const ID_COUNTER_KEY: &str = "blacklist:id";

fn email_key(email: &str) -> String {
    format!("blacklist:email:{email}")
}

/// A Redis blacklist store.
///
/// Each entry lives under its own key and is written with `SET NX`, so Redis
/// arbitrates concurrent submissions of the same email.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Creates a new Redis store from a connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Establishes a new Redis connection based on the provided URI.
    ///
    /// - To enable TLS, the URI must use the `rediss://` scheme.
    /// - To enable insecure TLS, the URI must use the `rediss://` scheme and end with `/#insecure`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = RedisClient::open(uri)?;
        let config = ConnectionManagerConfig::new().set_connection_timeout(Duration::from_secs(60));
        let conn = client.get_connection_manager_with_config(config).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl BlacklistStore for RedisStore {
    async fn migrate(&self) -> Result<()> {
        tracing::debug!("Redis store is schemaless, nothing to migrate");
        Ok(())
    }

    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome> {
        let mut conn = self.conn.clone();
        let key = email_key(&entry.email);

        // Ids burned by losing writers leave gaps, like a SQL sequence would.
        let id: i64 = conn.incr(ID_COUNTER_KEY, 1).await?;
        let created_at = Utc::now();
        let payload = serde_json::to_string(&entry.into_entry(id, created_at))?;

        let inserted: bool = conn.set_nx(&key, payload).await?;
        if inserted {
            Ok(CreateOutcome::Created { id, created_at })
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(email_key(email)).await?;
        let entry = payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()?;
        Ok(entry)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_key_layout() {
        assert_eq!(email_key("user@test.com"), "blacklist:email:user@test.com");
    }
}
