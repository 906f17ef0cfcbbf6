//! File-backed blob store with an in-memory index
//!
//! Each tier is a directory under the root; each entry is a body file plus a
//! JSON metadata file, both named by the SHA-256 of the key and the write's
//! sequence number. Every write lands in fresh files and the index points at
//! the newest one, so concurrent writers to a key never interleave bodies and
//! headers. The index is rebuilt from the metadata files on
//! [`FileBlobStore::init`], so insertion order survives restarts.

use crate::error::{OfflineError, Result};
use crate::request::CachedResponse;
use crate::store::BlobStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const BODY_EXT: &str = "bin";
const META_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    size: u64,
    seq: u64,
    stored_at: DateTime<Utc>,
}

pub struct FileBlobStore {
    root: PathBuf,
    /// tier -> key -> metadata
    index: RwLock<HashMap<String, HashMap<String, EntryMeta>>>,
    next_seq: AtomicU64,
}

impl FileBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            index: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Ensure the root exists and load every tier's metadata
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let mut index = HashMap::new();
        let mut max_seq = None;

        let mut tiers = fs::read_dir(&self.root).await?;
        while let Some(tier_entry) = tiers.next_entry().await? {
            if !tier_entry.file_type().await?.is_dir() {
                continue;
            }
            let tier = tier_entry.file_name().to_string_lossy().to_string();
            let entries = load_tier(&tier_entry.path()).await?;
            if let Some(seq) = entries.values().map(|m| m.seq).max() {
                max_seq = max_seq.max(Some(seq));
            }
            index.insert(tier, entries);
        }

        let loaded: usize = index.values().map(HashMap::len).sum();
        *self.index.write().await = index;
        self.next_seq
            .store(max_seq.map_or(0, |seq| seq + 1), Ordering::Relaxed);

        info!(root = ?self.root, entries = loaded, "Blob store initialized");
        Ok(())
    }

    /// File stem for a key
    pub fn entry_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn tier_dir(&self, tier: &str) -> Result<PathBuf> {
        let valid = !tier.is_empty()
            && !tier.starts_with('.')
            && tier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(OfflineError::Store(format!("invalid tier name: {tier:?}")));
        }
        Ok(self.root.join(tier))
    }

    fn entry_paths(dir: &Path, key: &str, seq: u64) -> (PathBuf, PathBuf) {
        let name = Self::entry_name(key);
        (
            dir.join(format!("{name}-{seq}.{BODY_EXT}")),
            dir.join(format!("{name}-{seq}.{META_EXT}")),
        )
    }

    async fn remove_files(dir: &Path, key: &str, seq: u64) {
        let (body_path, meta_path) = Self::entry_paths(dir, key, seq);
        let _ = fs::remove_file(&meta_path).await;
        let _ = fs::remove_file(&body_path).await;
    }

    /// Drop `key` from the index only if it still points at write `seq`
    async fn remove_if_current(&self, tier: &str, key: &str, seq: u64) -> bool {
        let mut index = self.index.write().await;
        let Some(entries) = index.get_mut(tier) else {
            return false;
        };
        if entries.get(key).is_some_and(|meta| meta.seq == seq) {
            entries.remove(key);
            true
        } else {
            false
        }
    }
}

async fn load_tier(dir: &Path) -> Result<HashMap<String, EntryMeta>> {
    let mut entries: HashMap<String, EntryMeta> = HashMap::new();
    let mut files = fs::read_dir(dir).await?;

    while let Some(file) = files.next_entry().await? {
        let path = file.path();
        if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
            continue;
        }
        let parsed = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<EntryMeta>(&raw).map_err(OfflineError::from),
            Err(e) => Err(e.into()),
        };
        let meta = match parsed {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping unreadable entry metadata");
                continue;
            }
        };

        // Leftovers of an interrupted overwrite: keep the newest write
        let newer_loaded = entries
            .get(&meta.key)
            .is_some_and(|current| current.seq > meta.seq);
        let stale = if newer_loaded {
            Some(meta.seq)
        } else {
            entries.insert(meta.key.clone(), meta.clone()).map(|old| old.seq)
        };
        if let Some(seq) = stale {
            FileBlobStore::remove_files(dir, &meta.key, seq).await;
        }
    }

    Ok(entries)
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn tier_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.index.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, tier: &str, key: &str) -> Result<Option<CachedResponse>> {
        let dir = self.tier_dir(tier)?;

        loop {
            let meta = {
                let index = self.index.read().await;
                index.get(tier).and_then(|entries| entries.get(key)).cloned()
            };
            let Some(meta) = meta else {
                return Ok(None);
            };

            let (body_path, _) = Self::entry_paths(&dir, key, meta.seq);
            match fs::read(&body_path).await {
                Ok(body) => {
                    return Ok(Some(CachedResponse {
                        status: meta.status,
                        headers: meta.headers,
                        body,
                    }))
                }
                Err(e) => {
                    if self.remove_if_current(tier, key, meta.seq).await {
                        warn!(tier, key, error = %e, "Failed to read cached body, removing entry");
                        Self::remove_files(&dir, key, meta.seq).await;
                        return Ok(None);
                    }
                    // Replaced by a newer write while reading
                }
            }
        }
    }

    async fn put(&self, tier: &str, key: &str, response: &CachedResponse) -> Result<()> {
        let dir = self.tier_dir(tier)?;
        fs::create_dir_all(&dir).await?;

        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            size: response.body.len() as u64,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            stored_at: Utc::now(),
        };

        let seq = meta.seq;
        let (body_path, meta_path) = Self::entry_paths(&dir, key, seq);
        let written = async {
            fs::write(&body_path, &response.body).await?;
            fs::write(&meta_path, serde_json::to_vec(&meta)?).await?;
            Ok::<(), OfflineError>(())
        };
        if let Err(e) = written.await {
            Self::remove_files(&dir, key, seq).await;
            return Err(e);
        }

        let superseded = {
            let mut index = self.index.write().await;
            let entries = index.entry(tier.to_string()).or_default();
            if entries.get(key).is_some_and(|current| current.seq > seq) {
                Some(seq)
            } else {
                entries.insert(key.to_string(), meta).map(|old| old.seq)
            }
        };
        if let Some(stale) = superseded {
            Self::remove_files(&dir, key, stale).await;
        }

        debug!(tier, key, size = response.body.len(), "Stored entry on disk");
        Ok(())
    }

    async fn delete(&self, tier: &str, key: &str) -> Result<bool> {
        let dir = self.tier_dir(tier)?;

        let removed = {
            let mut index = self.index.write().await;
            index.get_mut(tier).and_then(|entries| entries.remove(key))
        };

        match removed {
            Some(meta) => {
                Self::remove_files(&dir, key, meta.seq).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, tier: &str) -> Result<Vec<String>> {
        let index = self.index.read().await;
        let Some(entries) = index.get(tier) else {
            return Ok(Vec::new());
        };

        let mut metas: Vec<&EntryMeta> = entries.values().collect();
        metas.sort_by_key(|meta| meta.seq);
        Ok(metas.into_iter().map(|meta| meta.key.clone()).collect())
    }

    async fn delete_tier(&self, tier: &str) -> Result<bool> {
        let dir = self.tier_dir(tier)?;
        let existed = self.index.write().await.remove(tier).is_some();

        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(existed),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn response(body: &str) -> CachedResponse {
        CachedResponse::new(200, body.as_bytes().to_vec()).with_header("content-type", "audio/mpeg")
    }

    #[test]
    fn test_entry_name_is_sha256_hex() {
        let a = FileBlobStore::entry_name("GET http://localhost/tasks/a/play");
        let b = FileBlobStore::entry_name("GET http://localhost/tasks/a/play");
        let c = FileBlobStore::entry_name("GET http://localhost/tasks/b/play");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();

        store.put("audio-v1", "k1", &response("one")).await.unwrap();

        let hit = store.get("audio-v1", "k1").await.unwrap().unwrap();
        assert_eq!(hit.body, b"one");
        assert_eq!(hit.header("Content-Type"), Some("audio/mpeg"));
        assert!(store.get("audio-v1", "k2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileBlobStore::new(dir.path().to_path_buf());
            store.init().await.unwrap();
            for key in ["c", "a", "b"] {
                store.put("audio-v1", key, &response(key)).await.unwrap();
            }
            store.put("audio-v1", "c", &response("c2")).await.unwrap();
            store.put("static-v1", "/", &response("index")).await.unwrap();
        }

        let reopened = FileBlobStore::new(dir.path().to_path_buf());
        reopened.init().await.unwrap();

        assert_eq!(
            reopened.tier_names().await.unwrap(),
            vec!["audio-v1", "static-v1"]
        );
        assert_eq!(reopened.keys("audio-v1").await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            reopened.get("audio-v1", "c").await.unwrap().unwrap().body,
            b"c2"
        );

        reopened.put("audio-v1", "d", &response("d")).await.unwrap();
        assert_eq!(
            reopened.keys("audio-v1").await.unwrap(),
            vec!["a", "b", "c", "d"]
        );
    }

    #[tokio::test]
    async fn test_missing_body_file_drops_entry() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();
        store.put("audio-v1", "k1", &response("one")).await.unwrap();

        let (body, _) = FileBlobStore::entry_paths(&dir.path().join("audio-v1"), "k1", 0);
        std::fs::remove_file(body).unwrap();

        assert!(store.get("audio-v1", "k1").await.unwrap().is_none());
        assert!(store.keys("audio-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tier_removes_directory() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();
        store.put("old-v0", "k", &response("x")).await.unwrap();

        assert!(store.delete_tier("old-v0").await.unwrap());
        assert!(!dir.path().join("old-v0").exists());
        assert!(!store.delete_tier("old-v0").await.unwrap());
        assert!(store.tier_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_tier_names() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();

        for tier in ["", "../escape", ".hidden", "a/b"] {
            let err = store.put(tier, "k", &response("x")).await.unwrap_err();
            assert!(matches!(err, OfflineError::Store(_)), "{tier}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overwrites_never_mix_entries() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FileBlobStore::new(dir.path().to_path_buf()));
        store.init().await.unwrap();

        let small = CachedResponse::new(200, b"small".to_vec()).with_header("x-variant", "small");
        let large = CachedResponse::new(200, vec![b'L'; 256 * 1024]).with_header("x-variant", "large");

        for _ in 0..25 {
            let writes = [small.clone(), large.clone()].map(|entry| {
                let store = store.clone();
                tokio::spawn(async move { store.put("audio-v1", "k", &entry).await })
            });
            for write in writes {
                write.await.unwrap().unwrap();
            }

            let hit = store.get("audio-v1", "k").await.unwrap().unwrap();
            match hit.header("x-variant") {
                Some("small") => assert_eq!(hit.body, small.body),
                Some("large") => assert_eq!(hit.body, large.body),
                other => panic!("unexpected variant {other:?}"),
            }
        }

        let files = std::fs::read_dir(dir.path().join("audio-v1")).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_init_keeps_newest_of_leftover_writes() {
        let dir = tempdir().unwrap();
        let tier = dir.path().join("audio-v1");
        std::fs::create_dir_all(&tier).unwrap();

        for (seq, body) in [(3, "newer"), (1, "older")] {
            let (body_path, meta_path) = FileBlobStore::entry_paths(&tier, "k", seq);
            let meta = EntryMeta {
                key: "k".to_string(),
                status: 200,
                headers: Vec::new(),
                size: body.len() as u64,
                seq,
                stored_at: Utc::now(),
            };
            std::fs::write(body_path, body).unwrap();
            std::fs::write(meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();
        }

        let store = FileBlobStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();

        assert_eq!(store.get("audio-v1", "k").await.unwrap().unwrap().body, b"newer");
        assert_eq!(std::fs::read_dir(&tier).unwrap().count(), 2);

        store.put("audio-v1", "j", &response("j")).await.unwrap();
        assert_eq!(store.keys("audio-v1").await.unwrap(), vec!["k", "j"]);
    }
}
