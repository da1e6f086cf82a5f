//! In-memory content store.
//!
//! Used by tests and by origins that do not need persistence. Each entry
//! keeps the object and its owner together, so the shard lock taken by the
//! entry API makes every operation atomic per name.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{ContentStore, ObjectName, Owner};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Stored {
    content: Vec<u8>,
    owner: Option<Owner>,
}

/// Content store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectName, Stored>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with no owner record.
    ///
    /// Such objects are readable but no credential can delete them, matching
    /// files placed in an `FsStore` root by hand.
    pub fn insert_unowned(&self, url: &str, content: impl Into<Vec<u8>>) -> StoreResult<()> {
        let name = ObjectName::parse(url)?;
        self.objects.insert(
            name,
            Stored {
                content: content.into(),
                owner: None,
            },
        );
        Ok(())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, url: &str) -> StoreResult<Vec<u8>> {
        let name = ObjectName::parse(url)?;
        self.objects
            .get(&name)
            .map(|stored| stored.content.clone())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn post(&self, url: &str, owner: &Owner, content: &[u8]) -> StoreResult<()> {
        let name = ObjectName::parse(url)?;
        match self.objects.entry(name) {
            Entry::Occupied(entry) => Err(StoreError::Conflict {
                name: entry.key().to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Stored {
                    content: content.to_vec(),
                    owner: Some(owner.clone()),
                });
                Ok(())
            }
        }
    }

    async fn delete(&self, url: &str, owner: &Owner) -> StoreResult<()> {
        let name = ObjectName::parse(url)?;
        match self.objects.entry(name) {
            Entry::Vacant(entry) => Err(StoreError::NotFound {
                name: entry.key().to_string(),
            }),
            Entry::Occupied(entry) => {
                if entry.get().owner.as_ref() != Some(owner) {
                    return Err(StoreError::Forbidden {
                        name: entry.key().to_string(),
                    });
                }
                entry.remove();
                Ok(())
            }
        }
    }

    async fn owner_of(&self, url: &str) -> StoreResult<Option<Owner>> {
        let name = ObjectName::parse(url)?;
        Ok(self
            .objects
            .get(&name)
            .and_then(|stored| stored.owner.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn get_missing_is_not_found() {
        contract::get_missing_is_not_found(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn post_then_get() {
        contract::post_then_get(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn second_post_conflicts() {
        contract::second_post_conflicts(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn delete_by_stranger_is_forbidden() {
        contract::delete_by_stranger_is_forbidden(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn delete_by_owner_removes_entry() {
        contract::delete_by_owner_removes_entry(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        contract::delete_missing_is_not_found(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        contract::invalid_names_are_rejected(&MemoryStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_posts_to_distinct_names() {
        contract::concurrent_posts_to_distinct_names(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_posts_have_one_winner() {
        contract::racing_posts_have_one_winner(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn unowned_objects_cannot_be_deleted() {
        let store = MemoryStore::new();
        store.insert_unowned("/", b"<html></html>".to_vec()).unwrap();

        assert_eq!(store.get("").await.unwrap(), b"<html></html>");
        assert_eq!(store.owner_of("/").await.unwrap(), None);

        let result = store.delete("/", &Owner::new("", "")).await;
        assert!(matches!(result, Err(StoreError::Forbidden { .. })));
        assert_eq!(store.len(), 1);
    }
}
