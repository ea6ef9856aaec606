//! Listing cache with bulk invalidation through a master registry.
//!
//! The backend has no tag-based invalidation, so every key written under the
//! namespace is also appended to a registry entry (`{namespace}keys`). The
//! registry never expires; `invalidate_all` forgets every listed key and then
//! clears the registry. Concurrent writers race on the registry with
//! last-writer-wins semantics; a key lost that way still expires by TTL.

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::entry::{CacheError, EntryCache};
use super::keys::REGISTRY_SUFFIX;
use super::store::KvStore;

#[derive(Clone)]
pub struct ListCache {
    entries: EntryCache,
    registry_key: String,
}

impl ListCache {
    pub fn new(store: Arc<dyn KvStore>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            entries: EntryCache::new(store, namespace, ttl),
            registry_key: format!("{namespace}{REGISTRY_SUFFIX}"),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.entries.namespace()
    }

    pub fn registry_key(&self) -> &str {
        &self.registry_key
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.entries.get(key).await
    }

    /// Store an entry and register its key for bulk invalidation.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let full_key = self.entries.set(key, value).await?;
        self.register(full_key).await
    }

    pub async fn forget(&self, key: &str) -> Result<(), CacheError> {
        self.entries.forget(key).await
    }

    /// Full keys currently tracked by the registry.
    pub async fn registered_keys(&self) -> Result<Vec<String>, CacheError> {
        let raw = self.entries.store().get(&self.registry_key).await?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(keys) => Ok(keys),
            Err(err) => {
                warn!(
                    target = "cache::list",
                    registry = %self.registry_key,
                    error = %err,
                    "registry entry is corrupt; treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Forget every registered key, then clear the registry. Returns how many
    /// keys were listed.
    pub async fn invalidate_all(&self) -> Result<usize, CacheError> {
        let keys = self.registered_keys().await?;
        let store = self.entries.store();
        if !keys.is_empty() {
            store.delete(&keys).await?;
        }
        store.delete(&[self.registry_key.clone()]).await?;

        debug!(
            target = "cache::list",
            namespace = self.namespace(),
            forgotten = keys.len(),
            "listing cache invalidated"
        );
        Ok(keys.len())
    }

    async fn register(&self, full_key: String) -> Result<(), CacheError> {
        let mut keys = self.registered_keys().await?;
        if keys.contains(&full_key) {
            return Ok(());
        }
        keys.push(full_key);

        let raw = serde_json::to_string(&keys).map_err(|source| CacheError::Encode {
            key: self.registry_key.clone(),
            source,
        })?;
        self.entries
            .store()
            .set(&self.registry_key, &raw, None)
            .await?;
        Ok(())
    }
}
