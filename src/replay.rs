// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replay cache for inbound update messages.
//!
//! Agents receive the same update more than once (multicast, retries,
//! overlapping subscriptions). Records are keyed by (origin agent,
//! revision) so the update-application path can discard duplicates
//! before the change log or caches are touched.
//!
//! Expiry is lazy, at read time. Unlike the meta/data pair there is no
//! second collection to keep consistent here, records are small, and
//! the consuming agent polls shortly after writes land - a background
//! sweep would be overhead for nothing.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::metrics;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("no update from '{origin}' with revision {revision}")]
    NotFound { origin: String, revision: u64 },
}

/// One inbound update. Identity is the (origin, revision) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub origin: String,
    pub revision: u64,
    pub payload: Value,
    received_at: Instant,
}

impl UpdateRecord {
    #[must_use]
    pub fn new(origin: impl Into<String>, revision: u64, payload: Value) -> Self {
        Self {
            origin: origin.into(),
            revision,
            payload,
            received_at: Instant::now(),
        }
    }

    /// Time since the record was first received.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

/// Short-TTL store of inbound updates keyed by (origin, revision).
///
/// Per-key operations are independently safe; there is no global lock
/// beyond what the concurrent map provides.
pub struct UpdateReplayCache {
    records: DashMap<(String, u64), UpdateRecord>,
    retention: Duration,
}

impl UpdateReplayCache {
    /// `retention` is the maximum time a record stays retrievable.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            records: DashMap::new(),
            retention,
        }
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Insert an update. Re-adding an existing (origin, revision) swaps
    /// in the new payload but keeps the earliest receipt time, so a
    /// replayed duplicate can never extend its own retention window.
    pub fn add(&self, update: UpdateRecord) {
        let key = (update.origin.clone(), update.revision);
        match self.records.entry(key) {
            Entry::Occupied(mut occupied) => {
                let received_at = occupied.get().received_at;
                occupied.insert(UpdateRecord {
                    received_at,
                    ..update
                });
                metrics::record_replay("replace");
            }
            Entry::Vacant(vacant) => {
                trace!(origin = %update.origin, revision = update.revision, "update recorded");
                vacant.insert(update);
                metrics::record_replay("insert");
            }
        }
    }

    /// Return the stored record, or `NotFound` if absent or older than
    /// the retention time. Expired records are dropped on the spot.
    pub fn get_update(&self, origin: &str, revision: u64) -> Result<UpdateRecord, ReplayError> {
        let key = (origin.to_string(), revision);
        if let Some(record) = self.records.get(&key) {
            if record.age() < self.retention {
                metrics::record_replay("hit");
                return Ok(record.clone());
            }
            drop(record);
            self.records.remove(&key);
            metrics::record_replay("expired");
        } else {
            metrics::record_replay("miss");
        }
        Err(ReplayError::NotFound {
            origin: origin.to_string(),
            revision,
        })
    }

    /// True iff an unexpired record exists for (origin, revision).
    #[must_use]
    pub fn is_duplicate(&self, origin: &str, revision: u64) -> bool {
        self.get_update(origin, revision).is_ok()
    }

    /// Resident record count. Includes records that have aged out but
    /// were not read since, so treat it as an upper bound.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
