// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Expiry bookkeeping for cached remote subtrees.
//!
//! One entry per cached address. Entries expire by TTL or are marked
//! for removal out-of-band (e.g. after an authoritative invalidation
//! push); the [`CacheReclaimer`](super::reclaimer::CacheReclaimer)
//! consumes both kinds on its next sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

/// Metadata for one cached address.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    /// When the entry was inserted or last refreshed
    pub cached_at: Instant,
    /// Time-to-live from `cached_at`
    pub ttl: Duration,
    /// Marked for removal outside the TTL mechanism
    pub pending_removal: bool,
}

impl NodeMeta {
    fn new(ttl: Duration) -> Self {
        Self {
            cached_at: Instant::now(),
            ttl,
            pending_removal: false,
        }
    }

    /// True iff now >= cached_at + ttl.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Tracks which remote addresses are currently cached and their expiry.
///
/// The entry map sits behind a single mutex shared between request
/// paths and the reclaimer; the sweep is periodic, so contention stays
/// low.
#[derive(Debug, Default)]
pub struct MetaCache {
    entries: Mutex<HashMap<String, NodeMeta>>,
}

impl MetaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an entry; expiry becomes now + `ttl`.
    ///
    /// Refreshing also clears a pending-removal mark: a fresh
    /// authoritative copy supersedes the earlier invalidation.
    pub fn put(&self, addr: &str, ttl: Duration) {
        let mut entries = self.entries.lock();
        entries.insert(addr.to_string(), NodeMeta::new(ttl));
        trace!(address = %addr, ttl_ms = ttl.as_millis() as u64, "meta entry cached");
    }

    /// True iff the entry's TTL has elapsed. An absent address counts as
    /// expired: no meta entry means no guaranteed data availability.
    #[must_use]
    pub fn is_expired(&self, addr: &str) -> bool {
        self.entries
            .lock()
            .get(addr)
            .map_or(true, NodeMeta::is_expired)
    }

    /// True iff the address is present, unexpired, and not marked for
    /// removal. This is the check readers must pass before touching the
    /// data cache.
    #[must_use]
    pub fn is_cached(&self, addr: &str) -> bool {
        self.entries
            .lock()
            .get(addr)
            .is_some_and(|meta| !meta.is_expired() && !meta.pending_removal)
    }

    /// Mark an entry for removal outside the TTL mechanism. No-op for
    /// absent addresses.
    pub fn mark_for_removal(&self, addr: &str) {
        if let Some(meta) = self.entries.lock().get_mut(addr) {
            meta.pending_removal = true;
            trace!(address = %addr, "meta entry marked for removal");
        }
    }

    /// Consume the marked entries: they are removed from the map and
    /// their addresses returned exactly once.
    pub fn take_pending_removals(&self) -> Vec<String> {
        let mut entries = self.entries.lock();
        let marked: Vec<String> = entries
            .iter()
            .filter(|(_, meta)| meta.pending_removal)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &marked {
            entries.remove(addr);
        }
        marked
    }

    /// Remove and return every expired entry.
    pub fn sweep_expired(&self) -> Vec<String> {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, meta)| meta.is_expired())
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &expired {
            entries.remove(addr);
        }
        expired
    }

    /// One sweep's worth of doomed addresses, collected under a single
    /// lock acquisition: `(expired, pending_removal)`.
    pub fn collect_removals(&self) -> (Vec<String>, Vec<String>) {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, meta)| meta.is_expired())
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &expired {
            entries.remove(addr);
        }
        let pending: Vec<String> = entries
            .iter()
            .filter(|(_, meta)| meta.pending_removal)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &pending {
            entries.remove(addr);
        }
        (expired, pending)
    }

    /// Point-in-time snapshot of all entries, safe to iterate while the
    /// map keeps mutating.
    #[must_use]
    pub fn all_entries(&self) -> Vec<(String, NodeMeta)> {
        self.entries
            .lock()
            .iter()
            .map(|(addr, meta)| (addr.clone(), meta.clone()))
            .collect()
    }

    /// Unconditional removal, idempotent.
    pub fn remove(&self, addr: &str) {
        self.entries.lock().remove(addr);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_put_and_is_cached() {
        let meta = MetaCache::new();
        meta.put("/a", LONG);

        assert!(meta.is_cached("/a"));
        assert!(!meta.is_expired("/a"));
        assert!(!meta.is_cached("/b"));
    }

    #[test]
    fn test_absent_address_counts_as_expired() {
        let meta = MetaCache::new();
        assert!(meta.is_expired("/never/cached"));
    }

    #[test]
    fn test_ttl_expiry() {
        let meta = MetaCache::new();
        meta.put("/a", Duration::from_millis(30));

        assert!(meta.is_cached("/a"));
        sleep(Duration::from_millis(60));
        assert!(meta.is_expired("/a"));
        assert!(!meta.is_cached("/a"));
    }

    #[test]
    fn test_sweep_removes_exactly_the_expired() {
        let meta = MetaCache::new();
        // Same insertion time, staggered expiry points.
        meta.put("/t1", Duration::from_millis(20));
        meta.put("/t2", Duration::from_millis(40));
        meta.put("/t3", Duration::from_millis(40));
        meta.put("/t4", Duration::from_millis(300));
        meta.put("/t5", Duration::from_millis(300));

        sleep(Duration::from_millis(100));
        let mut expired = meta.sweep_expired();
        expired.sort();

        assert_eq!(expired, vec!["/t1", "/t2", "/t3"]);
        assert_eq!(meta.len(), 2);
        assert!(meta.is_cached("/t4"));
        assert!(meta.is_cached("/t5"));
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let meta = MetaCache::new();
        meta.put("/a", Duration::from_millis(40));
        sleep(Duration::from_millis(25));
        meta.put("/a", Duration::from_millis(40));
        sleep(Duration::from_millis(25));

        // 50ms after the first put, but only 25ms after the refresh.
        assert!(meta.is_cached("/a"));
    }

    #[test]
    fn test_pending_removals_are_consumed_once() {
        let meta = MetaCache::new();
        meta.put("/a", LONG);
        meta.put("/b", LONG);
        meta.mark_for_removal("/a");

        assert!(!meta.is_cached("/a"));
        assert!(meta.is_cached("/b"));

        assert_eq!(meta.take_pending_removals(), vec!["/a"]);
        assert_eq!(meta.take_pending_removals(), Vec::<String>::new());
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_mark_for_removal_on_absent_is_noop() {
        let meta = MetaCache::new();
        meta.mark_for_removal("/ghost");
        assert!(meta.take_pending_removals().is_empty());
    }

    #[test]
    fn test_collect_removals_never_reports_twice() {
        let meta = MetaCache::new();
        meta.put("/expired", Duration::from_millis(10));
        meta.put("/marked", LONG);
        meta.mark_for_removal("/marked");
        sleep(Duration::from_millis(30));

        let (expired, pending) = meta.collect_removals();
        assert_eq!(expired, vec!["/expired"]);
        assert_eq!(pending, vec!["/marked"]);
        assert!(meta.is_empty());

        let (expired, pending) = meta.collect_removals();
        assert!(expired.is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let meta = MetaCache::new();
        meta.put("/a", LONG);
        meta.remove("/a");
        meta.remove("/a");
        assert!(meta.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let meta = MetaCache::new();
        meta.put("/a", LONG);
        let snapshot = meta.all_entries();
        meta.remove("/a");

        assert_eq!(snapshot.len(), 1);
        assert!(meta.is_empty());
    }
}
