// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync core coordinator.
//!
//! [`SyncCore`] is one agent's handle on the whole synchronization and
//! caching layer: it owns the change log, both cache tiers, the type
//! index, and the replay cache, and it runs the background reclaimer.
//!
//! # Flow
//!
//! ```text
//! local mutation ──▶ log_change ──▶ ChangeLog ──▶ checkpoint/changes_since
//!               └──▶ index_subtree ──▶ TypeIndex
//!
//! remote fetch  ──▶ store_remote_subtree ──▶ DataCache + MetaCache
//! remote read   ──▶ get_cached (MetaCache consulted FIRST)
//! invalidation  ──▶ invalidate ──▶ swept on the reclaimer's next tick
//!
//! inbound update ──▶ apply_update ──▶ UpdateReplayCache dedup gate
//! ```
//!
//! # Example
//!
//! ```
//! use vsl_core::{SyncCore, VslCoreConfig};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut core = SyncCore::new(VslCoreConfig::default());
//! core.start();
//!
//! core.log_change("/agent1/lamp");
//! let checkpoint = core.checkpoint();
//! assert_eq!(core.changes_since(&checkpoint).unwrap().len(), 0);
//!
//! core.store_remote_subtree("/agent2/door", json!({"open": false}))
//!     .await
//!     .unwrap();
//! assert!(core.get_cached("/agent2/door", "agent1").await.is_ok());
//!
//! core.shutdown().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::data::{AccessPolicy, CacheError, DataCache, InMemoryDataCache};
use crate::cache::meta::MetaCache;
use crate::cache::reclaimer::{self, CacheReclaimer};
use crate::changelog::{ChangeLog, ChangeLogError};
use crate::config::VslCoreConfig;
use crate::metrics;
use crate::replay::{UpdateRecord, UpdateReplayCache};
use crate::typeindex::{TypeIndex, TypedNode};

/// One agent's synchronization and caching core.
///
/// # Thread Safety
///
/// `SyncCore` is `Send + Sync`; every owned component synchronizes
/// internally, so the core can be shared behind an `Arc` across request
/// handlers while the reclaimer runs on its own task.
pub struct SyncCore {
    config: VslCoreConfig,
    changelog: Arc<ChangeLog>,
    meta: Arc<MetaCache>,
    data: Arc<dyn DataCache>,
    types: Arc<TypeIndex>,
    replay: Arc<UpdateReplayCache>,
    /// Counter folded into generated logpoint ids so two checkpoints of
    /// an unchanged log still get distinct identifiers.
    checkpoint_seq: AtomicU64,
    shutdown: watch::Sender<bool>,
    reclaimer: Option<JoinHandle<()>>,
}

impl SyncCore {
    /// Core with a pure in-memory data cache that grants every read.
    #[must_use]
    pub fn new(config: VslCoreConfig) -> Self {
        Self::with_data_cache(config, Arc::new(InMemoryDataCache::new()))
    }

    /// Core with an in-memory data cache checked against `policy`.
    #[must_use]
    pub fn with_access_policy(config: VslCoreConfig, policy: Arc<dyn AccessPolicy>) -> Self {
        Self::with_data_cache(config, Arc::new(InMemoryDataCache::with_policy(policy)))
    }

    /// Core over a caller-supplied data cache (e.g. backed by the
    /// agent's tree store).
    #[must_use]
    pub fn with_data_cache(config: VslCoreConfig, data: Arc<dyn DataCache>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let replay = Arc::new(UpdateReplayCache::new(config.replay_retention()));
        Self {
            config,
            changelog: Arc::new(ChangeLog::new()),
            meta: Arc::new(MetaCache::new()),
            data,
            types: Arc::new(TypeIndex::new()),
            replay,
            checkpoint_seq: AtomicU64::new(0),
            shutdown,
            reclaimer: None,
        }
    }

    /// Spawn the background reclaimer. Calling twice is a no-op.
    pub fn start(&mut self) {
        if self.reclaimer.is_some() {
            return;
        }
        let reclaimer = CacheReclaimer::new(
            self.meta.clone(),
            self.data.clone(),
            self.config.reclaimer_interval(),
            self.shutdown.subscribe(),
        );
        self.reclaimer = Some(reclaimer.spawn());
        info!(
            interval_ms = self.config.reclaimer_interval_ms,
            cache_ttl_ms = self.config.cache_ttl_ms,
            "sync core started"
        );
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.reclaimer.is_some()
    }

    /// Stop the reclaimer and run one final sweep, so nothing lingers in
    /// the data cache that the meta cache no longer vouches for.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.reclaimer.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "reclaimer task join failed");
        }
        reclaimer::sweep(&self.meta, self.data.as_ref()).await;
        info!("sync core shut down");
    }

    // ========================================================================
    // Local mutation path
    // ========================================================================

    /// Record that the subtree at `addr` changed.
    pub fn log_change(&self, addr: &str) {
        self.changelog.log_changed_address(addr);
    }

    /// Register a subtree's structure in the type index.
    pub fn index_subtree(&self, addr: &str, structure: &dyn TypedNode) {
        self.types.add_types(addr, structure);
    }

    /// Drop a subtree (and all descendants) from the type index.
    pub fn deindex_subtree(&self, addr: &str) {
        self.types.remove_address(addr);
    }

    // ========================================================================
    // Checkpoints / delta queries
    // ========================================================================

    /// Create a logpoint with a generated identifier and return it.
    ///
    /// The id is SHA-256 over (previous id, entry count, local sequence
    /// number), hex-encoded. Peers treat it as opaque.
    pub fn checkpoint(&self) -> String {
        let seq = self.checkpoint_seq.fetch_add(1, Ordering::Relaxed);
        let previous = self.changelog.current_logpoint();

        let mut hasher = Sha256::new();
        hasher.update(previous.as_bytes());
        hasher.update(b"|");
        hasher.update(self.changelog.len().to_le_bytes());
        hasher.update(b"|");
        hasher.update(seq.to_le_bytes());
        let id = hex::encode(hasher.finalize());

        self.changelog.new_logpoint(&id);
        id
    }

    /// Create a logpoint under a caller-supplied identifier.
    pub fn checkpoint_as(&self, id: &str) {
        self.changelog.new_logpoint(id);
    }

    /// The current logpoint id, as peers would request deltas against.
    #[must_use]
    pub fn current_logpoint(&self) -> String {
        self.changelog.current_logpoint()
    }

    /// Minimal covering set of addresses changed since `logpoint`.
    pub fn changes_since(&self, logpoint: &str) -> Result<Vec<String>, ChangeLogError> {
        let _timer = crate::time_operation!("changes_since");
        self.changelog.changes_since(logpoint)
    }

    // ========================================================================
    // Remote subtree caching
    // ========================================================================

    /// Store a freshly fetched remote subtree with the configured TTL.
    ///
    /// The payload lands in the data cache before the meta entry is
    /// created: a data entry without meta is unreachable, the reverse
    /// would hand readers a validity claim with nothing behind it.
    pub async fn store_remote_subtree(&self, addr: &str, payload: Value) -> Result<(), CacheError> {
        self.data.cache(addr, payload).await?;
        self.meta.put(addr, self.config.cache_ttl());
        metrics::record_cache_operation("store", "success");
        metrics::set_cached_nodes(self.meta.len());
        Ok(())
    }

    /// Read a cached subtree. The meta cache is consulted first; an
    /// address it does not vouch for is `NotCached` regardless of what
    /// the data cache still holds.
    pub async fn get_cached(&self, addr: &str, identity: &str) -> Result<Value, CacheError> {
        let _timer = crate::time_operation!("get_cached");
        if !self.meta.is_cached(addr) {
            metrics::record_cache_operation("get", "miss");
            return Err(CacheError::NotCached(addr.to_string()));
        }
        match self.data.get(addr, identity).await {
            Ok(payload) => {
                metrics::record_cache_operation("get", "hit");
                Ok(payload)
            }
            Err(e) => {
                metrics::record_cache_operation("get", "error");
                Err(e)
            }
        }
    }

    /// Mark a cached address invalid ahead of its TTL (e.g. after an
    /// authoritative push). Purged on the reclaimer's next sweep.
    pub fn invalidate(&self, addr: &str) {
        self.meta.mark_for_removal(addr);
        debug!(address = %addr, "cache entry invalidated");
    }

    /// Remove an address from both tiers immediately. Idempotent.
    pub async fn remove_from_cache(&self, addr: &str) -> Result<(), CacheError> {
        self.meta.remove(addr);
        self.data.remove(addr).await?;
        metrics::record_cache_operation("remove", "success");
        Ok(())
    }

    // ========================================================================
    // Inbound updates
    // ========================================================================

    /// Gate an inbound update through the replay cache.
    ///
    /// Returns `false` for a duplicate (origin, revision) - the caller
    /// must not re-apply it. Returns `true` and records the update
    /// otherwise.
    pub fn apply_update(&self, update: UpdateRecord) -> bool {
        if self.replay.is_duplicate(&update.origin, update.revision) {
            debug!(
                origin = %update.origin,
                revision = update.revision,
                "duplicate update discarded"
            );
            return false;
        }
        self.replay.add(update);
        true
    }

    // ========================================================================
    // Component access (for the transport / query layers)
    // ========================================================================

    #[must_use]
    pub fn change_log(&self) -> &ChangeLog {
        &self.changelog
    }

    #[must_use]
    pub fn meta_cache(&self) -> &MetaCache {
        &self.meta
    }

    #[must_use]
    pub fn data_cache(&self) -> &Arc<dyn DataCache> {
        &self.data
    }

    #[must_use]
    pub fn type_index(&self) -> &TypeIndex {
        &self.types
    }

    #[must_use]
    pub fn replay_cache(&self) -> &UpdateReplayCache {
        &self.replay
    }

    #[must_use]
    pub fn config(&self) -> &VslCoreConfig {
        &self.config
    }
}

impl Drop for SyncCore {
    fn drop(&mut self) {
        // Stop a still-running reclaimer; dropping the watch sender
        // alone would also do it, but an explicit signal is clearer.
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quick_config() -> VslCoreConfig {
        VslCoreConfig {
            cache_ttl_ms: 60_000,
            reclaimer_interval_ms: 20,
            replay_retention_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_shutdown_joins() {
        let mut core = SyncCore::new(quick_config());
        core.start();
        core.start();
        assert!(core.is_running());

        core.shutdown().await;
        assert!(!core.is_running());
        // Shutting down twice is harmless.
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_checkpoint_ids_are_unique_and_current() {
        let core = SyncCore::new(quick_config());
        let h1 = core.checkpoint();
        let h2 = core.checkpoint();

        assert_ne!(h1, h2);
        assert_eq!(core.current_logpoint(), h2);
    }

    #[tokio::test]
    async fn test_delta_roundtrip_via_checkpoints() {
        let core = SyncCore::new(quick_config());
        core.log_change("/1/2/3");
        core.log_change("/1/2/4");
        let h1 = core.checkpoint();
        core.log_change("/1/2/5");

        assert_eq!(core.changes_since(&h1).unwrap(), vec!["/1/2/5"]);
    }

    #[tokio::test]
    async fn test_store_then_get_cached() {
        let core = SyncCore::new(quick_config());
        core.store_remote_subtree("/agent2/door", json!({"open": true}))
            .await
            .unwrap();

        let payload = core.get_cached("/agent2/door", "agent1").await.unwrap();
        assert_eq!(payload["open"], true);
    }

    #[tokio::test]
    async fn test_get_cached_checks_meta_first() {
        let core = SyncCore::new(quick_config());
        // Data present without a meta entry must stay invisible.
        core.data_cache()
            .cache("/orphan", json!(1))
            .await
            .unwrap();

        let err = core.get_cached("/orphan", "agent1").await.unwrap_err();
        assert!(matches!(err, CacheError::NotCached(_)));
    }

    #[tokio::test]
    async fn test_invalidate_is_swept() {
        let mut core = SyncCore::new(quick_config());
        core.start();

        core.store_remote_subtree("/x", json!(1)).await.unwrap();
        core.invalidate("/x");
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        assert!(core.get_cached("/x", "agent1").await.is_err());
        assert!(core.meta_cache().is_empty());
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_apply_update_discards_duplicates() {
        let core = SyncCore::new(quick_config());

        assert!(core.apply_update(UpdateRecord::new("agent2", 7, json!("v1"))));
        assert!(!core.apply_update(UpdateRecord::new("agent2", 7, json!("v1"))));
        // Different revision from the same origin passes.
        assert!(core.apply_update(UpdateRecord::new("agent2", 8, json!("v2"))));
    }

    #[tokio::test]
    async fn test_remove_from_cache_is_idempotent() {
        let core = SyncCore::new(quick_config());
        core.store_remote_subtree("/a", json!(1)).await.unwrap();

        core.remove_from_cache("/a").await.unwrap();
        core.remove_from_cache("/a").await.unwrap();

        assert!(core.get_cached("/a", "agent1").await.is_err());
    }
}
