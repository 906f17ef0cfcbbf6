//! Periodic size bound for the audio tier
//!
//! Eviction is by insertion order, oldest first. Because [`BlobStore::put`]
//! moves an overwritten key to the newest position, audio that was refetched
//! recently survives a sweep even if it was first stored long ago.

use crate::error::Result;
use crate::store::BlobStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const DEFAULT_MAX_ENTRIES: usize = 50;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct EvictionConfig {
    /// Entries kept after a sweep
    pub max_entries: usize,
    pub interval: Duration,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            interval: DEFAULT_INTERVAL,
        }
    }
}

pub struct EvictionPolicy {
    store: Arc<dyn BlobStore>,
    tier: String,
    config: EvictionConfig,
}

impl EvictionPolicy {
    pub fn new(store: Arc<dyn BlobStore>, tier: impl Into<String>, config: EvictionConfig) -> Self {
        Self {
            store,
            tier: tier.into(),
            config,
        }
    }

    /// Delete the oldest keys beyond `max_entries`, returning how many were
    /// removed.
    ///
    /// Writes racing with the sweep are not blocked, so the count afterwards
    /// is approximate.
    pub async fn sweep(&self) -> Result<usize> {
        let keys = self.store.keys(&self.tier).await?;
        if keys.len() <= self.config.max_entries {
            debug!(tier = %self.tier, entries = keys.len(), "Audio tier within bound");
            return Ok(0);
        }

        let excess = keys.len() - self.config.max_entries;
        let deletions = keys[..excess]
            .iter()
            .map(|key| self.store.delete(&self.tier, key));

        let mut removed = 0;
        for result in join_all(deletions).await {
            match result {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(tier = %self.tier, error = %e, "Failed to evict entry"),
            }
        }

        info!(tier = %self.tier, removed, kept = self.config.max_entries, "Evicted oldest audio entries");
        Ok(removed)
    }

    /// Run [`sweep`](Self::sweep) on a fixed timer, independent of request
    /// handling. The first sweep happens one interval after spawning.
    pub fn spawn(self: Arc<Self>) -> EvictionHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));

        EvictionHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(tier = %self.tier, error = %e, "Eviction sweep failed");
                    }
                }
                _ = stopped(&mut shutdown_rx) => break,
            }
        }

        debug!(tier = %self.tier, "Eviction timer exited");
    }
}

/// Resolves once shutdown is requested or the sender is gone; the watch guard
/// never outlives this call.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Cancellation handle for a spawned eviction timer
pub struct EvictionHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl EvictionHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EvictionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
