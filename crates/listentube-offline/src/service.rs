//! Cache-first and network-first retrieval over the two tiers

use crate::classify::{RequestClassifier, RouteClass};
use crate::error::{OfflineError, Result};
use crate::network::Network;
use crate::request::{CachedResponse, RequestDescriptor};
use crate::store::BlobStore;
use crate::tiers::TierNames;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

impl ResponseSource {
    /// Value of the `X-Cache` response header
    pub fn as_header(self) -> &'static str {
        match self {
            ResponseSource::Cache => "HIT",
            ResponseSource::Network => "MISS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
    pub class: RouteClass,
}

/// Counters since startup
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Static requests answered from the static tier
    pub hits: u64,
    /// Cacheable requests answered from the network
    pub misses: u64,
    /// Requests answered from a tier after a network failure
    pub fallbacks: u64,
    pub passthrough: u64,
}

pub struct CacheService {
    store: Arc<dyn BlobStore>,
    network: Arc<dyn Network>,
    classifier: RequestClassifier,
    tiers: TierNames,
    hits: AtomicU64,
    misses: AtomicU64,
    fallbacks: AtomicU64,
    passthrough: AtomicU64,
}

impl CacheService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        network: Arc<dyn Network>,
        classifier: RequestClassifier,
        tiers: TierNames,
    ) -> Self {
        Self {
            store,
            network,
            classifier,
            tiers,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn tiers(&self) -> &TierNames {
        &self.tiers
    }

    /// Classify and answer one intercepted request
    pub async fn handle(&self, request: &RequestDescriptor) -> Result<Served> {
        let class = self.classifier.classify(request);
        debug!(method = %request.method, path = request.path(), class = class.as_str(), "Intercepted request");

        let (response, source) = match class {
            RouteClass::Static => self.cache_first(request).await?,
            RouteClass::AudioDownload | RouteClass::AudioPlay => self.network_first(request).await?,
            RouteClass::Passthrough => {
                self.passthrough.fetch_add(1, Ordering::Relaxed);
                (self.network.fetch(request).await?, ResponseSource::Network)
            }
        };

        Ok(Served {
            response,
            source,
            class,
        })
    }

    async fn cache_first(&self, request: &RequestDescriptor) -> Result<(CachedResponse, ResponseSource)> {
        let tier = &self.tiers.static_tier;
        let key = request.cache_key();

        match self.store.get(tier, &key).await {
            Ok(Some(cached)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Static cache hit");
                return Ok((cached, ResponseSource::Cache));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Static tier lookup failed"),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                // The first lookup may have errored or raced a concurrent fill
                if let Ok(Some(cached)) = self.store.get(tier, &key).await {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    info!(key = %key, error = %e, "Serving cached static asset after network failure");
                    return Ok((cached, ResponseSource::Cache));
                }
                return Err(e);
            }
        };
        if response.is_cacheable() {
            if let Err(e) = self.store.put(tier, &key, &response).await {
                warn!(key = %key, error = %e, "Failed to store static asset");
            }
        }
        Ok((response, ResponseSource::Network))
    }

    async fn network_first(&self, request: &RequestDescriptor) -> Result<(CachedResponse, ResponseSource)> {
        let tier = &self.tiers.audio_tier;
        let key = request.cache_key();

        let reason = match self.network.fetch(request).await {
            Ok(response) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                if response.is_cacheable() {
                    if let Err(e) = self.store.put(tier, &key, &response).await {
                        warn!(key = %key, error = %e, "Failed to store audio");
                    }
                }
                return Ok((response, ResponseSource::Network));
            }
            Err(e) => e.to_string(),
        };

        match self.store.get(tier, &key).await {
            Ok(Some(cached)) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                info!(key = %key, reason = %reason, "Serving cached audio while upstream is unreachable");
                Ok((cached, ResponseSource::Cache))
            }
            Ok(None) => Err(OfflineError::Retrieval { key, reason }),
            Err(e) => {
                warn!(key = %key, error = %e, "Audio tier lookup failed");
                Err(OfflineError::Retrieval { key, reason })
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
        }
    }
}
