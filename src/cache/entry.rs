//! TTL-bounded JSON entries under a key namespace.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

use super::store::{KvError, KvStore};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("failed to encode cache entry `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone)]
pub struct EntryCache {
    store: Arc<dyn KvStore>,
    namespace: &'static str,
    ttl: Duration,
}

impl EntryCache {
    pub fn new(store: Arc<dyn KvStore>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            store,
            namespace,
            ttl,
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Read an entry. Entries that no longer decode are dropped and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let full_key = self.full_key(key);
        let Some(raw) = self.store.get(&full_key).await? else {
            counter!("quire_cache_miss_total", "namespace" => self.namespace).increment(1);
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!("quire_cache_hit_total", "namespace" => self.namespace).increment(1);
                Ok(Some(value))
            }
            Err(err) => {
                warn!(
                    target = "cache::entry",
                    key = %full_key,
                    error = %err,
                    "discarding undecodable cache entry"
                );
                self.store.delete(&[full_key]).await?;
                counter!("quire_cache_miss_total", "namespace" => self.namespace).increment(1);
                Ok(None)
            }
        }
    }

    /// Write an entry with the namespace TTL, returning the full key written.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<String, CacheError> {
        let full_key = self.full_key(key);
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Encode {
            key: full_key.clone(),
            source,
        })?;
        self.store.set(&full_key, &raw, Some(self.ttl)).await?;
        Ok(full_key)
    }

    pub async fn forget(&self, key: &str) -> Result<(), CacheError> {
        self.store.delete(&[self.full_key(key)]).await?;
        Ok(())
    }
}
