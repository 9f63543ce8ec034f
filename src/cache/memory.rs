// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{CacheEntry, CacheError, CacheStore};

/// Process-local cache store; lost on restart.
pub struct InMemoryStore {
    data: DashMap<String, CacheEntry>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { data: DashMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.data.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::CachedCampaign;

    fn entry(id: &str) -> CacheEntry {
        let mut entry = CacheEntry::default();
        entry.campaigns.insert(id.to_string(), CachedCampaign::default());
        entry
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = InMemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.put("k", &entry("c1")).await.unwrap();
        store.put("k", &entry("c2")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get("k").await.unwrap().unwrap().campaigns.contains_key("c2"));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let store = InMemoryStore::new();
        store.put("k", &entry("c1")).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }
}
