// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-agent change log with named logpoints and compacting delta queries.
//!
//! Every local mutation appends the changed address to the log. Peers
//! synchronize by asking "what changed since logpoint X" and re-fetching
//! the returned subtrees. The answer is compacted to the minimal covering
//! set of ancestors: re-fetching an ancestor subtree already includes all
//! of its descendants' changes, so reporting the descendants too would
//! only inflate the transfer.
//!
//! # Logpoints
//!
//! A logpoint is a caller-named checkpoint bound to the end-of-log
//! position at creation time. Identifiers are opaque strings; the log
//! does not compute them. Re-registering an identifier moves it (last
//! write wins). The distinguished [`INITIAL_LOGPOINT`] is always valid
//! and denotes the position before any entry.
//!
//! # Compaction is range-local
//!
//! Only entries inside the queried range suppress each other. An
//! ancestor logged before the queried logpoint was already delivered to
//! the peer and does not suppress a later descendant entry.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::address;
use crate::metrics;

/// The logpoint that precedes every entry. Always valid for delta queries.
pub const INITIAL_LOGPOINT: &str = "0";

/// Errors from delta queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeLogError {
    #[error("unknown logpoint '{0}'")]
    UnknownLogpoint(String),
}

#[derive(Debug, Default)]
struct LogState {
    /// Changed addresses in strict append order. Never truncated.
    entries: Vec<String>,
    /// Logpoint id -> number of entries present when it was created.
    logpoints: HashMap<String, usize>,
    /// Most recently registered logpoint id.
    current: Option<String>,
}

/// Append-only log of changed addresses.
///
/// A single mutex guards entries and logpoints together, so logpoint
/// creation snapshots the end-of-log atomically with respect to
/// concurrent appends.
#[derive(Debug, Default)]
pub struct ChangeLog {
    state: Mutex<LogState>,
}

impl ChangeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a changed address at the next sequence position.
    pub fn log_changed_address(&self, addr: &str) {
        let mut state = self.state.lock();
        state.entries.push(addr.to_string());
        metrics::record_changelog_append();
    }

    /// Register `id` as a logpoint at the current end of the log.
    ///
    /// An already-known `id` is moved to the new position. The id becomes
    /// the current logpoint either way.
    pub fn new_logpoint(&self, id: &str) {
        let mut state = self.state.lock();
        let position = state.entries.len();
        state.logpoints.insert(id.to_string(), position);
        state.current = Some(id.to_string());
        debug!(logpoint = %id, position, "logpoint registered");
    }

    /// The most recently registered logpoint id, or [`INITIAL_LOGPOINT`]
    /// if none has been registered yet.
    #[must_use]
    pub fn current_logpoint(&self) -> String {
        self.state
            .lock()
            .current
            .clone()
            .unwrap_or_else(|| INITIAL_LOGPOINT.to_string())
    }

    /// Minimal covering set of addresses changed strictly after `id`.
    ///
    /// Within the queried range, an entry is dropped when another entry
    /// in the same range is a strict ancestor of it; duplicates collapse
    /// to their first occurrence. Surviving addresses keep their original
    /// relative order.
    pub fn changes_since(&self, id: &str) -> Result<Vec<String>, ChangeLogError> {
        let state = self.state.lock();
        let position = match state.logpoints.get(id) {
            Some(position) => *position,
            None if id == INITIAL_LOGPOINT => 0,
            None => return Err(ChangeLogError::UnknownLogpoint(id.to_string())),
        };

        let range = &state.entries[position..];
        let mut compacted: Vec<String> = Vec::new();
        for addr in range {
            if compacted.iter().any(|kept| kept == addr) {
                continue;
            }
            if range
                .iter()
                .any(|other| address::is_strict_ancestor(other, addr))
            {
                continue;
            }
            compacted.push(addr.clone());
        }

        metrics::record_delta_query(range.len(), compacted.len());
        debug!(
            logpoint = %id,
            raw = range.len(),
            compacted = compacted.len(),
            "delta query"
        );
        Ok(compacted)
    }

    /// Total number of entries ever appended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Number of registered logpoints.
    #[must_use]
    pub fn logpoint_count(&self) -> usize {
        self.state.lock().logpoints.len()
    }
}
