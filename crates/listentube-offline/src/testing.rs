//! Scripted upstream and store fakes shared by the unit tests

use crate::error::{OfflineError, Result};
use crate::network::Network;
use crate::request::{CachedResponse, RequestDescriptor};
use crate::store::{BlobStore, MemoryBlobStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers by path; unscripted paths get a 404
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, CachedResponse>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, path: &str, status: u16, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            CachedResponse::new(status, body.to_vec()).with_header("content-type", "audio/mpeg"),
        );
    }

    /// Transport failure for one path only
    pub(crate) fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    /// Transport failure for every path
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Paths fetched so far, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<CachedResponse> {
        let path = request.path().to_string();
        self.calls.lock().unwrap().push(path.clone());

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&path) {
            return Err(OfflineError::Network("connection refused".to_string()));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| CachedResponse::new(404, b"not found".to_vec())))
    }
}

/// In-memory store with injectable lookup and write failures
pub(crate) struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_next_get: AtomicBool,
    puts_left: AtomicUsize,
}

impl FlakyBlobStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            fail_next_get: AtomicBool::new(false),
            puts_left: AtomicUsize::new(usize::MAX),
        }
    }

    /// The next `get` errors; later ones succeed
    pub(crate) fn fail_next_get(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }

    /// Allow `count` more writes, then fail every one after
    pub(crate) fn fail_puts_after(&self, count: usize) {
        self.puts_left.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn tier_names(&self) -> Result<Vec<String>> {
        self.inner.tier_names().await
    }

    async fn get(&self, tier: &str, key: &str) -> Result<Option<CachedResponse>> {
        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(OfflineError::Store("lookup unavailable".to_string()));
        }
        self.inner.get(tier, key).await
    }

    async fn put(&self, tier: &str, key: &str, response: &CachedResponse) -> Result<()> {
        let allowed = self
            .puts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(OfflineError::Store("quota exceeded".to_string()));
        }
        self.inner.put(tier, key, response).await
    }

    async fn delete(&self, tier: &str, key: &str) -> Result<bool> {
        self.inner.delete(tier, key).await
    }

    async fn keys(&self, tier: &str) -> Result<Vec<String>> {
        self.inner.keys(tier).await
    }

    async fn delete_tier(&self, tier: &str) -> Result<bool> {
        self.inner.delete_tier(tier).await
    }
}
