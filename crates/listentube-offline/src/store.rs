//! Blob-store abstraction and the in-memory implementation

use crate::error::Result;
use crate::request::CachedResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Named-tier key/value store owned by the host runtime.
///
/// Callers hold only tier names and keys and never assume exclusive access:
/// concurrent writes to one key are last-writer-wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every tier that currently exists
    async fn tier_names(&self) -> Result<Vec<String>>;

    async fn get(&self, tier: &str, key: &str) -> Result<Option<CachedResponse>>;

    /// Insert or overwrite, creating the tier if needed. An overwritten key
    /// moves to the newest insertion position.
    async fn put(&self, tier: &str, key: &str, response: &CachedResponse) -> Result<()>;

    /// Returns whether the key existed
    async fn delete(&self, tier: &str, key: &str) -> Result<bool>;

    /// Keys in insertion order, oldest first
    async fn keys(&self, tier: &str) -> Result<Vec<String>>;

    /// Returns whether the tier existed
    async fn delete_tier(&self, tier: &str) -> Result<bool>;
}

struct StoredEntry {
    seq: u64,
    response: CachedResponse,
}

/// Process-local [`BlobStore`]
#[derive(Default)]
pub struct MemoryBlobStore {
    tiers: RwLock<HashMap<String, HashMap<String, StoredEntry>>>,
    next_seq: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn tier_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tiers.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, tier: &str, key: &str) -> Result<Option<CachedResponse>> {
        let tiers = self.tiers.read().await;
        Ok(tiers
            .get(tier)
            .and_then(|entries| entries.get(key))
            .map(|entry| entry.response.clone()))
    }

    async fn put(&self, tier: &str, key: &str, response: &CachedResponse) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut tiers = self.tiers.write().await;
        tiers.entry(tier.to_string()).or_default().insert(
            key.to_string(),
            StoredEntry {
                seq,
                response: response.clone(),
            },
        );
        debug!(tier, key, size = response.body.len(), "Stored entry");
        Ok(())
    }

    async fn delete(&self, tier: &str, key: &str) -> Result<bool> {
        let mut tiers = self.tiers.write().await;
        Ok(tiers
            .get_mut(tier)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, tier: &str) -> Result<Vec<String>> {
        let tiers = self.tiers.read().await;
        let Some(entries) = tiers.get(tier) else {
            return Ok(Vec::new());
        };

        let mut keyed: Vec<(u64, &String)> = entries.iter().map(|(k, e)| (e.seq, k)).collect();
        keyed.sort_by_key(|(seq, _)| *seq);
        Ok(keyed.into_iter().map(|(_, k)| k.clone()).collect())
    }

    async fn delete_tier(&self, tier: &str) -> Result<bool> {
        Ok(self.tiers.write().await.remove(tier).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse::new(200, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryBlobStore::new();
        store.put("audio", "k1", &response("one")).await.unwrap();

        let hit = store.get("audio", "k1").await.unwrap().unwrap();
        assert_eq!(hit.body, b"one");
        assert!(store.get("audio", "k2").await.unwrap().is_none());
        assert!(store.get("static", "k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let store = MemoryBlobStore::new();
        for key in ["c", "a", "b"] {
            store.put("audio", key, &response(key)).await.unwrap();
        }
        assert_eq!(store.keys("audio").await.unwrap(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_overwrite_moves_key_to_newest() {
        let store = MemoryBlobStore::new();
        for key in ["a", "b", "c"] {
            store.put("audio", key, &response(key)).await.unwrap();
        }
        store.put("audio", "a", &response("fresh")).await.unwrap();

        assert_eq!(store.keys("audio").await.unwrap(), vec!["b", "c", "a"]);
        assert_eq!(store.get("audio", "a").await.unwrap().unwrap().body, b"fresh");
    }

    #[tokio::test]
    async fn test_delete_and_tiers() {
        let store = MemoryBlobStore::new();
        store.put("static-v1", "k", &response("x")).await.unwrap();
        store.put("audio-v1", "k", &response("y")).await.unwrap();

        assert_eq!(
            store.tier_names().await.unwrap(),
            vec!["audio-v1", "static-v1"]
        );
        assert!(store.delete("audio-v1", "k").await.unwrap());
        assert!(!store.delete("audio-v1", "k").await.unwrap());
        assert!(store.delete_tier("static-v1").await.unwrap());
        assert!(!store.delete_tier("static-v1").await.unwrap());
        assert_eq!(store.tier_names().await.unwrap(), vec!["audio-v1"]);
        assert!(store.keys("missing").await.unwrap().is_empty());
    }
}
