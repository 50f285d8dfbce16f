pub mod store;

pub use store::{
    AnyStore, BlacklistStore, MemoryStore, PgStore, RedisStore, SqlStore, StoreError, open_store,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const IP_ADDRESS_MAX_LEN: usize = 64;

/// A persisted blacklist record.
///
/// `email` is always stored normalized and is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlacklistEntry {
    pub id: i64,
    pub email: String,
    pub app_uuid: String,
    pub blocked_reason: Option<String>,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

/// A validated entry waiting to be handed to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub email: String,
    pub app_uuid: String,
    pub blocked_reason: Option<String>,
    pub ip_address: String,
}

impl NewEntry {
    /// Attaches the store-assigned identity.
    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> BlacklistEntry {
        BlacklistEntry {
            id,
            email: self.email,
            app_uuid: self.app_uuid,
            blocked_reason: self.blocked_reason,
            ip_address: self.ip_address,
            created_at,
        }
    }
}

/// Result of [`BlacklistStore::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: i64, created_at: DateTime<Utc> },
    /// The email was already blacklisted; the existing record is left untouched.
    AlreadyExists,
}

/// Uniqueness key for an email: surrounding whitespace removed, lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@B.com "), "a@b.com");
        assert_eq!(normalize_email("\tUser@Test.COM\n"), "user@test.com");
        assert_eq!(normalize_email("user@test.com"), "user@test.com");
    }

    #[test]
    fn test_into_entry_keeps_fields() {
        let created_at = Utc::now();
        let entry = NewEntry {
            email: "user@test.com".into(),
            app_uuid: "6f1c2f8e-8d4b-4c1e-9a55-0b0f6b1f3c11".into(),
            blocked_reason: None,
            ip_address: "10.0.0.1".into(),
        }
        .into_entry(7, created_at);

        assert_eq!(entry.id, 7);
        assert_eq!(entry.email, "user@test.com");
        assert_eq!(entry.blocked_reason, None);
        assert_eq!(entry.created_at, created_at);
    }
}
