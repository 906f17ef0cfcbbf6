//! Core types for the ListenTube proxy

use listentube_offline::CacheStats;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Configuration for the proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    /// Job processor every request is forwarded to
    pub upstream: Url,
    /// On-disk tiers when set, process memory otherwise
    pub cache_dir: Option<PathBuf>,
    pub cache_prefix: String,
    pub cache_version: String,
    pub audio_max_entries: usize,
    pub eviction_interval: Duration,
    pub upstream_timeout: Duration,
}

/// Entry counts for the current generation's tiers
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierSizes {
    pub static_entries: usize,
    pub audio_entries: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
    pub tiers: TierSizes,
}
