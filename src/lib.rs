//! # vsl-core
//!
//! Synchronization and caching core of the Virtual State Layer (VSL),
//! the hierarchical namespace shared by a smart space's Knowledge
//! Agents (KAs). Each agent owns a subtree of addressed nodes; this
//! crate keeps peers eventually consistent while bounding staleness,
//! duplicate work, and query cost.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SyncCore                              │
//! │  • One handle per agent, wires everything below             │
//! │  • Spawns the background CacheReclaimer                     │
//! └─────────────────────────────────────────────────────────────┘
//!        │                │                  │
//!        ▼                ▼                  ▼
//! ┌──────────────┐ ┌───────────────┐ ┌──────────────────┐
//! │  ChangeLog   │ │ Meta + Data   │ │    TypeIndex     │
//! │  • append    │ │ caches        │ │  • type → addrs  │
//! │  • logpoints │ │ • TTL expiry  │ │  • hierarchical  │
//! │  • compacted │ │ • two-phase   │ │    removal       │
//! │    deltas    │ │   reclaim     │ │                  │
//! └──────────────┘ └───────────────┘ └──────────────────┘
//!        ▲                ▲
//!        │     ┌──────────────────────┐
//!        │     │  UpdateReplayCache   │
//!        └──── │  • (origin, rev) key │ ◀── inbound updates
//!              │  • lazy expiry       │
//!              └──────────────────────┘
//! ```
//!
//! ## Quick Start
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
//! // A local mutation: log it, checkpoint, answer a peer's delta query.
//! core.log_change("/agent1/lamp/brightness");
//! let logpoint = core.checkpoint();
//!
//! // A remote subtree fetched from a peer: cache it with bounded staleness.
//! core.store_remote_subtree("/agent2/door", json!({"open": false}))
//!     .await
//!     .unwrap();
//!
//! core.shutdown().await;
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`SyncCore`] tying all components together
//! - [`changelog`]: hash-checkpointed change log with compacting delta queries
//! - [`cache`]: meta/data cache tiers and the background reclaimer
//! - [`replay`]: dedup cache for inbound update messages
//! - [`typeindex`]: type → address reverse index
//! - [`address`]: hierarchical address helpers
//! - [`config`]: tunables supplied by the agent's configuration provider
//! - [`metrics`]: backend-agnostic instrumentation

pub mod address;
pub mod cache;
pub mod changelog;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod replay;
pub mod typeindex;

pub use cache::data::{AccessPolicy, AllowAll, CacheError, DataCache, InMemoryDataCache};
pub use cache::meta::{MetaCache, NodeMeta};
pub use cache::reclaimer::CacheReclaimer;
pub use changelog::{ChangeLog, ChangeLogError, INITIAL_LOGPOINT};
pub use config::VslCoreConfig;
pub use coordinator::SyncCore;
pub use metrics::LatencyTimer;
pub use replay::{ReplayError, UpdateRecord, UpdateReplayCache};
pub use typeindex::{StructureNode, TypeIndex, TypedNode};
