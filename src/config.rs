//! Configuration for the sync core.
//!
//! # Example
//!
//! ```
//! use vsl_core::VslCoreConfig;
//!
//! // Minimal config (uses defaults)
//! let config = VslCoreConfig::default();
//! assert_eq!(config.reclaimer_interval_ms, 5_000);
//!
//! // Full config
//! let config = VslCoreConfig {
//!     cache_ttl_ms: 30_000,
//!     reclaimer_interval_ms: 2_000,
//!     replay_retention_ms: 500,
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the sync core.
///
/// All fields have sensible defaults. The values are typically supplied
/// by the agent's configuration provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VslCoreConfig {
    /// TTL for cached remote subtrees in milliseconds (default: 60 s)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Reclaimer sweep interval in milliseconds (default: 5 s)
    #[serde(default = "default_reclaimer_interval_ms")]
    pub reclaimer_interval_ms: u64,

    /// Max retention for inbound update records in milliseconds (default: 5 s)
    #[serde(default = "default_replay_retention_ms")]
    pub replay_retention_ms: u64,
}

fn default_cache_ttl_ms() -> u64 { 60_000 }
fn default_reclaimer_interval_ms() -> u64 { 5_000 }
fn default_replay_retention_ms() -> u64 { 5_000 }

impl Default for VslCoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
            reclaimer_interval_ms: default_reclaimer_interval_ms(),
            replay_retention_ms: default_replay_retention_ms(),
        }
    }
}

impl VslCoreConfig {
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    #[must_use]
    pub fn reclaimer_interval(&self) -> Duration {
        Duration::from_millis(self.reclaimer_interval_ms)
    }

    #[must_use]
    pub fn replay_retention(&self) -> Duration {
        Duration::from_millis(self.replay_retention_ms)
    }
}
