//! ListenTube offline cache
//!
//! Everything the request-interception layer does, expressed over abstract
//! collaborators so it can be driven without a live host:
//!
//! - [`RequestClassifier`] routes a request to static, audio-download,
//!   audio-play or passthrough handling
//! - [`CacheService`] applies cache-first (static) or network-first (audio)
//!   retrieval against a [`BlobStore`]
//! - [`install`] primes the static tier, [`activate`] drops stale tier
//!   generations
//! - [`EvictionPolicy`] bounds the audio tier on its own timer

mod classify;
mod error;
mod eviction;
mod file_store;
mod lifecycle;
mod network;
mod request;
mod service;
mod store;
mod tiers;

pub use classify::{RequestClassifier, RouteClass};
pub use error::{OfflineError, Result};
pub use eviction::{EvictionConfig, EvictionHandle, EvictionPolicy};
pub use file_store::FileBlobStore;
pub use lifecycle::{activate, install};
pub use network::{HttpNetwork, Network};
pub use request::{CachedResponse, RequestDescriptor};
pub use service::{CacheService, CacheStats, ResponseSource, Served};
pub use store::{BlobStore, MemoryBlobStore};
pub use tiers::{StaticAssets, TierNames};

#[cfg(test)]
mod testing;
