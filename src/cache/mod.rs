// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Two-tier cache for remotely-fetched subtrees.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Cache Module                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  meta.rs      - MetaCache: which addresses are cached,       │
//! │                 when they expire, which are marked doomed    │
//! │  data.rs      - DataCache trait + in-memory implementation   │
//! │                 (payloads, access-policy checked reads)      │
//! │  reclaimer.rs - periodic sweep: collect expired/marked       │
//! │                 under the meta lock, purge data lock-free    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! MetaCache is the sole authority for "is this address still valid".
//! Readers consult it before ever touching the DataCache, which is why
//! the reclaimer may purge DataCache entries outside the meta lock: a
//! data entry whose meta counterpart is gone is unreachable garbage,
//! not an inconsistency.

pub mod data;
pub mod meta;
pub mod reclaimer;

pub use data::{AccessPolicy, AllowAll, CacheError, DataCache, InMemoryDataCache};
pub use meta::{MetaCache, NodeMeta};
pub use reclaimer::CacheReclaimer;
