//! Install and activate phases of the interception layer

use crate::error::{OfflineError, Result};
use crate::network::Network;
use crate::request::{CachedResponse, RequestDescriptor};
use crate::store::BlobStore;
use crate::tiers::{StaticAssets, TierNames};
use futures::future::try_join_all;
use tracing::{info, warn};
use url::Url;

/// Prime the static tier with every asset, all or nothing.
///
/// Every asset is fetched before anything is written, so a single failed or
/// non-2xx fetch leaves the tier untouched. A failed write removes the
/// entries this call already stored. Returns the number of entries stored.
pub async fn install(
    store: &dyn BlobStore,
    network: &dyn Network,
    tiers: &TierNames,
    assets: &StaticAssets,
    origin: &Url,
) -> Result<usize> {
    let fetches = assets.iter().map(|asset| async move {
        let url = origin.join(asset).map_err(|e| OfflineError::InstallPrime {
            asset: asset.to_string(),
            reason: e.to_string(),
        })?;
        let request = RequestDescriptor::get(url);

        let response = network
            .fetch(&request)
            .await
            .map_err(|e| OfflineError::InstallPrime {
                asset: asset.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_cacheable() {
            return Err(OfflineError::InstallPrime {
                asset: asset.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        Ok::<(&str, String, CachedResponse), OfflineError>((asset, request.cache_key(), response))
    });

    let primed = match try_join_all(fetches).await {
        Ok(primed) => primed,
        Err(e) => {
            warn!(error = %e, "Static tier priming failed");
            return Err(e);
        }
    };

    let tier = &tiers.static_tier;
    for (written, (asset, key, response)) in primed.iter().enumerate() {
        if let Err(e) = store.put(tier, key, response).await {
            warn!(asset = %asset, error = %e, "Static tier write failed, rolling back");
            for (_, stored, _) in &primed[..written] {
                if let Err(e) = store.delete(tier, stored).await {
                    warn!(key = %stored, error = %e, "Failed to roll back primed entry");
                }
            }
            return Err(OfflineError::InstallPrime {
                asset: asset.to_string(),
                reason: e.to_string(),
            });
        }
    }

    info!(tier = %tiers.static_tier, assets = primed.len(), "Static tier primed");
    Ok(primed.len())
}

/// Delete every tier that belongs to an older generation, returning the
/// names removed
pub async fn activate(store: &dyn BlobStore, tiers: &TierNames) -> Result<Vec<String>> {
    let mut removed = Vec::new();

    for name in store.tier_names().await? {
        if tiers.is_current(&name) {
            continue;
        }
        if store.delete_tier(&name).await? {
            info!(tier = %name, "Deleted stale tier");
            removed.push(name);
        }
    }

    Ok(removed)
}
