// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background cache reclaimer.
//!
//! Runs on its own task at a fixed period. Each sweep is two-phase:
//! collect expired and marked-for-removal addresses under the meta
//! lock, then purge the corresponding data entries with no lock held.
//! Once an address is gone from the MetaCache no reader can legally
//! observe its DataCache copy, so the unsynchronized purge is safe.
//!
//! The task never raises. Cancellation is observed between sweeps: a
//! sweep that has collected removal candidates always finishes applying
//! them before the loop checks the shutdown signal again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::metrics;

use super::data::DataCache;
use super::meta::MetaCache;

/// Remove everything MetaCache no longer vouches for. Returns the
/// number of addresses purged from the data cache.
pub async fn sweep(meta: &MetaCache, data: &dyn DataCache) -> usize {
    // Phase one: collect under the shared meta lock.
    let (expired, pending) = meta.collect_removals();

    // Phase two: purge the data cache lock-free.
    for addr in expired.iter().chain(pending.iter()) {
        if let Err(e) = data.remove(addr).await {
            warn!(address = %addr, error = %e, "data cache purge failed");
        }
    }

    metrics::record_sweep(expired.len(), pending.len());
    metrics::set_cached_nodes(meta.len());

    let purged = expired.len() + pending.len();
    if purged > 0 {
        debug!(
            expired = expired.len(),
            pending = pending.len(),
            "cache sweep purged entries"
        );
    }
    purged
}

/// Periodic cache eviction task.
pub struct CacheReclaimer {
    meta: Arc<MetaCache>,
    data: Arc<dyn DataCache>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl CacheReclaimer {
    pub fn new(
        meta: Arc<MetaCache>,
        data: Arc<dyn DataCache>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            meta,
            data,
            period,
            shutdown,
        }
    }

    /// Run one sweep on demand.
    pub async fn sweep_once(&self) -> usize {
        sweep(&self.meta, self.data.as_ref()).await
    }

    /// Spawn the reclaimer onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sweep at the configured period until the shutdown signal flips.
    pub async fn run(mut self) {
        debug!(period_ms = self.period.as_millis() as u64, "cache reclaimer running");
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
        debug!("cache reclaimer stopped");
    }
}
