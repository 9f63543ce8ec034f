// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite-backed cache store for warm starts across restarts.
//!
//! ```sql
//! CREATE TABLE cache_entries (
//!     cache_key TEXT PRIMARY KEY,     -- "{account}:{since}:{until}"
//!     payload BLOB NOT NULL,          -- zstd-compressed JSON
//!     payload_hash TEXT NOT NULL,     -- sha256 of the uncompressed JSON
//!     saved_at INTEGER NOT NULL       -- Unix timestamp
//! );
//! ```

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{any::AnyPoolOptions, AnyPool, Row};
use tracing::{debug, info, warn};

use super::codec;
use super::traits::{CacheEntry, CacheError, CacheStore};
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqliteStore {
    pool: AnyPool,
}

impl SqliteStore {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(path: &str) -> Result<Self, CacheError> {
        install_drivers();
        let url = format!("sqlite://{}?mode=rwc", path);
        let url = url.as_str();

        let pool = retry("cache_connect", &RetryConfig::local_store(), || async {
            AnyPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .map_err(|e| CacheError::Backend(format!("Failed to open cache DB: {}", e)))
        })
        .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(path, "Cache database ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                payload_hash TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(format!("Failed to create cache_entries table: {}", e)))?;
        Ok(())
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<u64, CacheError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let n: i64 = row.try_get("n").map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(n.max(0) as u64)
    }

    /// Overwrite the stored hash of `key` (used to simulate corruption in tests).
    #[cfg(test)]
    async fn tamper_hash(&self, key: &str, hash: &str) {
        sqlx::query("UPDATE cache_entries SET payload_hash = ? WHERE cache_key = ?")
            .bind(hash)
            .bind(key)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query("SELECT payload, payload_hash FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to load cache entry: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: Vec<u8> = row.try_get("payload").map_err(|e| CacheError::Backend(e.to_string()))?;
        let expected: String =
            row.try_get("payload_hash").map_err(|e| CacheError::Backend(e.to_string()))?;

        let (entry, actual) = codec::decode(&payload)?;
        if actual != expected {
            warn!(key, expected = %expected, actual = %actual, "Cache entry hash mismatch");
            return Err(CacheError::Corruption { key: key.to_string(), expected, actual });
        }
        debug!(key, campaigns = entry.len(), bytes = payload.len(), "Loaded cache entry");
        Ok(Some(entry))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let encoded = codec::encode(entry)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (cache_key, payload, payload_hash, saved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                payload_hash = excluded.payload_hash,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(key)
        .bind(encoded.payload.as_slice())
        .bind(encoded.hash.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(format!("Failed to save cache entry: {}", e)))?;

        debug!(key, campaigns = entry.len(), bytes = encoded.payload.len(), "Cache entry saved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to delete cache entry: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::CachedCampaign;
    use crate::model::{AdGroup, Entity, EntityStatus};
    use tempfile::tempdir;

    fn entry() -> CacheEntry {
        let mut entry = CacheEntry::default();
        entry.campaigns.insert(
            "c1".into(),
            CachedCampaign { ad_groups: vec![AdGroup::new(Entity::new("g1", "G", EntityStatus::Active))] },
        );
        entry
    }

    #[tokio::test]
    async fn test_put_get_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path).await.unwrap();
            store.put("act:2026-01-01:2026-01-07", &entry()).await.unwrap();
            store.put("act:2026-01-01:2026-01-07", &entry()).await.unwrap();
            assert_eq!(store.count().await.unwrap(), 1);
        }

        let store = SqliteStore::open(path).await.unwrap();
        assert_eq!(store.get("act:2026-01-01:2026-01-07").await.unwrap(), Some(entry()));
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        store.put("k", &entry()).await.unwrap();
        store.tamper_hash("k", "deadbeef").await;

        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Corruption { ref expected, .. } if expected == "deadbeef"));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        store.put("k", &entry()).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
