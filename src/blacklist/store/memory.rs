use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::blacklist::{
    BlacklistEntry, CreateOutcome, NewEntry,
    store::{BlacklistStore, Result},
};

/// An in-memory blacklist store.
///
/// Useful for testing and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, BlacklistEntry>>,
    last_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome> {
        // The shard lock held by `entry` makes check-and-insert atomic.
        match self.entries.entry(entry.email.clone()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
                let created_at = Utc::now();
                slot.insert(entry.into_entry(id, created_at));
                Ok(CreateOutcome::Created { id, created_at })
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>> {
        Ok(self.entries.get(email).map(|entry| entry.value().clone()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_entry(email: &str) -> NewEntry {
        NewEntry {
            email: email.to_string(),
            app_uuid: "6f1c2f8e-8d4b-4c1e-9a55-0b0f6b1f3c11".to_string(),
            blocked_reason: Some("spam".to_string()),
            ip_address: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_flow() {
        let store = MemoryStore::new();

        let outcome = store.create(new_entry("user@test.com")).await.unwrap();
        let CreateOutcome::Created { id, created_at } = outcome else {
            panic!("expected a new entry, got {outcome:?}");
        };

        let found = store.find_by_email("user@test.com").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.created_at, created_at);
        assert_eq!(found.blocked_reason.as_deref(), Some("spam"));

        assert_eq!(store.find_by_email("other@test.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first_entry() {
        let store = MemoryStore::new();
        store.create(new_entry("user@test.com")).await.unwrap();

        let mut second = new_entry("user@test.com");
        second.blocked_reason = Some("other".to_string());
        let outcome = store.create(second).await.unwrap();

        assert_eq!(outcome, CreateOutcome::AlreadyExists);
        assert_eq!(store.len(), 1);
        let found = store.find_by_email("user@test.com").await.unwrap().unwrap();
        assert_eq!(found.blocked_reason.as_deref(), Some("spam"));
    }

    #[tokio::test]
    async fn test_ids_are_distinct() {
        let store = MemoryStore::new();
        store.create(new_entry("a@test.com")).await.unwrap();
        store.create(new_entry("b@test.com")).await.unwrap();

        let a = store.find_by_email("a@test.com").await.unwrap().unwrap();
        let b = store.find_by_email("b@test.com").await.unwrap().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_concurrent_creates_persist_once() {
        let store = MemoryStore::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_entry("race@test.com")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if let CreateOutcome::Created { .. } = handle.await.unwrap().unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }
}
