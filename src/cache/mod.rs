// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Warm-start cache for loaded ad groups.
//!
//! The cache is advisory: entries may be stale or missing, and nothing reads
//! them as the source of truth. [`CacheLayer`] therefore never returns an
//! error. Backend, codec and corruption failures are logged, counted and
//! treated as a miss (on load) or a no-op (on save).

pub mod codec;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CacheEntry, CacheError, CacheStore, CachedCampaign};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::model::{Campaign, SelectionKey};

/// Error-swallowing facade over an optional [`CacheStore`].
#[derive(Clone)]
pub struct CacheLayer {
    store: Option<Arc<dyn CacheStore>>,
}

impl CacheLayer {
    /// No persistence at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self { store: None }
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    /// SQLite when `cache_path` is set, in-memory otherwise. A database that
    /// cannot be opened degrades to in-memory.
    pub async fn from_config(config: &SyncConfig) -> Self {
        match &config.cache_path {
            Some(path) => match SqliteStore::open(path).await {
                Ok(store) => Self::with_store(Arc::new(store)),
                Err(e) => {
                    warn!(path = %path, error = %e, "Cache database unavailable, using in-memory cache");
                    Self::memory()
                }
            },
            None => Self::memory(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn load(&self, key: &SelectionKey) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;
        let cache_key = key.cache_key();
        match store.get(&cache_key).await {
            Ok(Some(entry)) => {
                crate::metrics::record_cache("load", "hit");
                Some(entry)
            }
            Ok(None) => {
                crate::metrics::record_cache("load", "miss");
                None
            }
            Err(e) => {
                crate::metrics::record_cache("load", "error");
                warn!(key = %cache_key, error = %e, "Cache load failed, ignoring");
                if matches!(e, CacheError::Corruption { .. }) {
                    let _ = store.delete(&cache_key).await;
                }
                None
            }
        }
    }

    /// Persist the loaded ad groups of `campaigns`. Returns whether an entry
    /// was written.
    pub async fn save(&self, key: &SelectionKey, campaigns: &[Campaign]) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        let entry = CacheEntry::from_campaigns(campaigns);
        if entry.is_empty() {
            debug!(key = %key.cache_key(), "Nothing worth caching");
            return false;
        }
        match store.put(&key.cache_key(), &entry).await {
            Ok(()) => {
                crate::metrics::record_cache("save", "stored");
                true
            }
            Err(e) => {
                crate::metrics::record_cache("save", "error");
                warn!(key = %key.cache_key(), error = %e, "Cache save failed, ignoring");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::model::{AccountKey, AdGroup, DateRange, Entity, EntityStatus};

    struct Broken;

    #[async_trait]
    impl CacheStore for Broken {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Backend("disk full".into()))
        }
        async fn put(&self, _key: &str, _entry: &CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Backend("disk full".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Ok(())
        }
    }

    fn key() -> SelectionKey {
        let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        SelectionKey::new(AccountKey::new("act_1"), DateRange::new(day, day))
    }

    fn loaded() -> Vec<Campaign> {
        vec![Campaign::new(Entity::new("c1", "C", EntityStatus::Active))
            .with_ad_groups(vec![AdGroup::new(Entity::new("g1", "G", EntityStatus::Active))])]
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let cache = CacheLayer::memory();
        assert!(cache.load(&key()).await.is_none());
        assert!(cache.save(&key(), &loaded()).await);
        let entry = cache.load(&key()).await.unwrap();
        assert_eq!(entry.campaigns["c1"].ad_groups.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_not_saved() {
        let cache = CacheLayer::memory();
        let bare = vec![Campaign::new(Entity::new("c1", "C", EntityStatus::Active))];
        assert!(!cache.save(&key(), &bare).await);
    }

    #[tokio::test]
    async fn test_backend_errors_are_swallowed() {
        let cache = CacheLayer::with_store(Arc::new(Broken));
        assert!(cache.load(&key()).await.is_none());
        assert!(!cache.save(&key(), &loaded()).await);
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = CacheLayer::disabled();
        assert!(!cache.is_enabled());
        assert!(!cache.save(&key(), &loaded()).await);
        assert!(cache.load(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_unopenable_path_falls_back_to_memory() {
        let config = SyncConfig {
            cache_path: Some("/nonexistent-dir/deeper/cache.db".into()),
            ..Default::default()
        };
        let cache = CacheLayer::from_config(&config).await;
        assert!(cache.is_enabled());
        assert!(cache.save(&key(), &loaded()).await);
    }
}
