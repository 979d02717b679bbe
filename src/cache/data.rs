//! Data cache: payload storage for cached subtrees.
//!
//! The [`DataCache`] trait has exactly the operations the sync core
//! needs, so a pure in-memory implementation serves tests while a
//! store-backed one (delegating to the agent's tree store) serves
//! production. Reads are checked against an [`AccessPolicy`] before any
//! payload leaves the cache.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("node '{0}' is not cached")]
    NotCached(String),
    #[error("identity '{identity}' is not allowed to read '{address}'")]
    Unauthorized { identity: String, address: String },
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Authorization collaborator consulted before a cached payload is
/// returned. Implemented by the surrounding middleware; the core only
/// owns the seam.
pub trait AccessPolicy: Send + Sync {
    fn may_read(&self, identity: &str, address: &str) -> bool;
}

/// Policy that grants every read. Used by tests and trusted-local setups.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn may_read(&self, _identity: &str, _address: &str) -> bool {
        true
    }
}

#[async_trait]
pub trait DataCache: Send + Sync {
    /// Store or overwrite the payload for `addr`.
    async fn cache(&self, addr: &str, payload: Value) -> Result<(), CacheError>;

    /// Return the payload for `addr`, or `NotCached` if absent, or
    /// `Unauthorized` if the identity lacks read rights.
    async fn get(&self, addr: &str, identity: &str) -> Result<Value, CacheError>;

    /// Remove the payload for `addr`. Idempotent.
    async fn remove(&self, addr: &str) -> Result<(), CacheError>;
}

/// Pure in-memory data cache over a concurrent map.
pub struct InMemoryDataCache {
    nodes: DashMap<String, Value>,
    policy: Arc<dyn AccessPolicy>,
}

impl InMemoryDataCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Arc::new(AllowAll))
    }

    #[must_use]
    pub fn with_policy(policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            nodes: DashMap::new(),
            policy,
        }
    }

    /// Current payload count
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, addr: &str) -> bool {
        self.nodes.contains_key(addr)
    }
}

impl Default for InMemoryDataCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataCache for InMemoryDataCache {
    async fn cache(&self, addr: &str, payload: Value) -> Result<(), CacheError> {
        self.nodes.insert(addr.to_string(), payload);
        Ok(())
    }

    async fn get(&self, addr: &str, identity: &str) -> Result<Value, CacheError> {
        let payload = self
            .nodes
            .get(addr)
            .ok_or_else(|| CacheError::NotCached(addr.to_string()))?;
        if !self.policy.may_read(identity, addr) {
            return Err(CacheError::Unauthorized {
                identity: identity.to_string(),
                address: addr.to_string(),
            });
        }
        Ok(payload.value().clone())
    }

    async fn remove(&self, addr: &str) -> Result<(), CacheError> {
        self.nodes.remove(addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Denies one specific identity, grants everyone else.
    struct DenyIdentity(&'static str);

    impl AccessPolicy for DenyIdentity {
        fn may_read(&self, identity: &str, _address: &str) -> bool {
            identity != self.0
        }
    }

    #[tokio::test]
    async fn test_cache_and_get() {
        let cache = InMemoryDataCache::new();
        cache
            .cache("/a/b", json!({"value": 1}))
            .await
            .unwrap();

        let payload = cache.get("/a/b", "agent1").await.unwrap();
        assert_eq!(payload["value"], 1);
    }

    #[tokio::test]
    async fn test_get_absent_is_not_cached() {
        let cache = InMemoryDataCache::new();
        let err = cache.get("/missing", "agent1").await.unwrap_err();
        assert!(matches!(err, CacheError::NotCached(_)));
    }

    #[tokio::test]
    async fn test_get_denied_identity() {
        let cache = InMemoryDataCache::with_policy(Arc::new(DenyIdentity("mallory")));
        cache.cache("/a", json!(1)).await.unwrap();

        assert!(cache.get("/a", "alice").await.is_ok());
        let err = cache.get("/a", "mallory").await.unwrap_err();
        assert!(matches!(err, CacheError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_cache_overwrites() {
        let cache = InMemoryDataCache::new();
        cache.cache("/a", json!(1)).await.unwrap();
        cache.cache("/a", json!(2)).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/a", "agent1").await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = InMemoryDataCache::new();
        cache.cache("/a", json!(1)).await.unwrap();

        cache.remove("/a").await.unwrap();
        cache.remove("/a").await.unwrap();

        assert!(cache.is_empty());
        assert!(cache.get("/a", "agent1").await.is_err());
    }
}
