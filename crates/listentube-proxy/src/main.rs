//! ListenTube Proxy - offline-capable caching front for the job processor
//!
//! Serves the web client's static assets cache-first and retrieved audio
//! network-first, keeping a bounded audio tier for playback while the job
//! processor is unreachable.

mod error;
mod server;
mod types;

use crate::error::{ProxyError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ProxyConfig;
use listentube_offline::{
    activate, install, BlobStore, CacheService, EvictionConfig, EvictionPolicy, FileBlobStore,
    HttpNetwork, MemoryBlobStore, RequestClassifier, StaticAssets, TierNames,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("listentube_proxy=info".parse()?)
        .add_directive("listentube_offline=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting ListenTube Proxy...");

    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Upstream: {}", config.upstream);
    info!("Cache dir: {:?}", config.cache_dir);
    info!(
        "Audio tier bound: {} entries, swept every {} seconds",
        config.audio_max_entries,
        config.eviction_interval.as_secs()
    );

    let store: Arc<dyn BlobStore> = match &config.cache_dir {
        Some(dir) => {
            let store = FileBlobStore::new(dir.clone());
            store.init().await?;
            Arc::new(store)
        }
        None => Arc::new(MemoryBlobStore::new()),
    };
    let network = Arc::new(HttpNetwork::new(config.upstream_timeout)?);
    let tiers = TierNames::versioned(&config.cache_prefix, &config.cache_version);
    let assets = StaticAssets::default();

    // Priming failure is not fatal; static assets are cached on first request
    if let Err(e) = install(store.as_ref(), network.as_ref(), &tiers, &assets, &config.upstream).await {
        error!(error = %e, "Install failed, static tier left unprimed");
    }
    let removed = activate(store.as_ref(), &tiers).await?;
    info!("Activated {} / {} ({} stale tiers removed)", tiers.static_tier, tiers.audio_tier, removed.len());

    let eviction = Arc::new(EvictionPolicy::new(
        store.clone(),
        tiers.audio_tier.clone(),
        EvictionConfig {
            max_entries: config.audio_max_entries,
            interval: config.eviction_interval,
        },
    ));
    let _eviction = eviction.spawn();

    let service = CacheService::new(store, network, RequestClassifier::new(assets), tiers);
    let state: SharedState = Arc::new(ServerState::new(service, config.upstream));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ProxyError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<ProxyConfig> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(9001);

    let upstream_raw =
        std::env::var("UPSTREAM_URL").unwrap_or_else(|_| "http://127.0.0.1:9000".to_string());
    let upstream = Url::parse(&upstream_raw)
        .map_err(|e| ProxyError::Config(format!("invalid UPSTREAM_URL {}: {}", upstream_raw, e)))?;

    let cache_dir = std::env::var("CACHE_DIR").ok().map(PathBuf::from);

    let cache_prefix = std::env::var("CACHE_PREFIX").unwrap_or_else(|_| "listentube".to_string());
    let cache_version = std::env::var("CACHE_VERSION").unwrap_or_else(|_| "v1".to_string());

    let audio_max_entries = std::env::var("AUDIO_CACHE_MAX_ENTRIES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(50);

    let eviction_interval = std::env::var("EVICTION_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(300); // 5 minutes default

    let upstream_timeout = std::env::var("UPSTREAM_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60);

    Ok(ProxyConfig {
        port,
        upstream,
        cache_dir,
        cache_prefix,
        cache_version,
        audio_max_entries,
        eviction_interval: Duration::from_secs(eviction_interval),
        upstream_timeout: Duration::from_secs(upstream_timeout),
    })
}
