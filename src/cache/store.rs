//! Key-value storage behind the read caches and the search index.
//!
//! Production runs against Redis (`infra::kv::RedisStore`); single-node setups
//! and tests use [`MemoryKvStore`].

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value backend unavailable: {0}")]
    Backend(String),
    #[error("key `{key}` holds a value of the wrong kind")]
    WrongKind { key: String },
}

impl KvError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Store a string value; `None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Delete keys, ignoring those that do not exist.
    async fn delete(&self, keys: &[String]) -> Result<(), KvError>;

    /// Replace the whole hash stored at `key` with `fields`.
    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<(), KvError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, KvError>;

    /// Every key starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

#[derive(Debug, Clone)]
enum MemoryValue {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: Instant,
}

/// Entries without a TTL (registries, search hashes) live outside the LRU and
/// are only removed by `delete`. The capacity bound applies to TTL'd entries.
struct MemoryEntries {
    persistent: HashMap<String, MemoryValue>,
    expiring: LruCache<String, MemoryEntry>,
}

impl MemoryEntries {
    fn live(&mut self, key: &str, now: Instant) -> Option<MemoryValue> {
        if let Some(value) = self.persistent.get(key) {
            return Some(value.clone());
        }
        let found = self
            .expiring
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.value.clone()));
        match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                self.expiring.pop(key);
                None
            }
            None => None,
        }
    }

    fn put(&mut self, key: &str, value: MemoryValue, ttl: Option<Duration>) {
        match ttl {
            Some(ttl) => {
                self.persistent.remove(key);
                let entry = MemoryEntry {
                    value,
                    expires_at: Instant::now() + ttl,
                };
                self.expiring.put(key.to_string(), entry);
            }
            None => {
                self.expiring.pop(key);
                self.persistent.insert(key.to_string(), value);
            }
        }
    }

    fn live_keys(&self, now: Instant) -> impl Iterator<Item = &String> {
        self.persistent.keys().chain(
            self.expiring
                .iter()
                .filter(move |(_, entry)| entry.expires_at > now)
                .map(|(key, _)| key),
        )
    }
}

/// In-process store with LRU eviction and lazy TTL expiry for cache entries.
pub struct MemoryKvStore {
    entries: Mutex<MemoryEntries>,
}

impl MemoryKvStore {
    /// `capacity` bounds the number of entries stored with a TTL.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(MemoryEntries {
                persistent: HashMap::new(),
                expiring: LruCache::new(capacity),
            }),
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "len").live_keys(now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_value(&self, key: &str, op: &'static str) -> Option<MemoryValue> {
        mutex_lock(&self.entries, SOURCE, op).live(key, Instant::now())
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self.live_value(key, "get") {
            Some(MemoryValue::Text(value)) => Ok(Some(value)),
            Some(MemoryValue::Hash(_)) => Err(KvError::WrongKind {
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        mutex_lock(&self.entries, SOURCE, "set").put(
            key,
            MemoryValue::Text(value.to_string()),
            ttl,
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete");
        for key in keys {
            entries.persistent.remove(key.as_str());
            entries.expiring.pop(key.as_str());
        }
        Ok(())
    }

    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<(), KvError> {
        mutex_lock(&self.entries, SOURCE, "hash_replace").put(
            key,
            MemoryValue::Hash(fields.iter().cloned().collect()),
            None,
        );
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, KvError> {
        match self.live_value(key, "hash_get_all") {
            Some(MemoryValue::Hash(fields)) => Ok(fields),
            Some(MemoryValue::Text(_)) => Err(KvError::WrongKind {
                key: key.to_string(),
            }),
            None => Ok(HashMap::new()),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let now = Instant::now();
        let keys = mutex_lock(&self.entries, SOURCE, "scan_prefix")
            .live_keys(now)
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryKvStore {
        MemoryKvStore::new(NonZeroUsize::new(16).expect("capacity"))
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = store();
        store
            .set("k", "v", Some(Duration::from_secs(60)))
            .await
            .expect("set");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_without_ttl_persist() {
        let store = store();
        store.set("k", "v", None).await.expect("set");
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn hash_replace_drops_previous_fields() {
        let store = store();
        let first = vec![
            ("title".to_string(), "One".to_string()),
            ("excerpt".to_string(), "old".to_string()),
        ];
        store.hash_replace("post:1", &first).await.expect("write");
        let second = vec![("title".to_string(), "Two".to_string())];
        store.hash_replace("post:1", &second).await.expect("write");

        let fields = store.hash_get_all("post:1").await.expect("read");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title").map(String::as_str), Some("Two"));
    }

    #[tokio::test]
    async fn scan_prefix_filters_keys() {
        let store = store();
        store.set("post:1", "a", None).await.expect("set");
        store.set("post:2", "b", None).await.expect("set");
        store.set("blog:list:keys", "[]", None).await.expect("set");

        let mut keys = store.scan_prefix("post:").await.expect("scan");
        keys.sort();
        assert_eq!(keys, vec!["post:1", "post:2"]);
    }

    #[tokio::test]
    async fn reading_wrong_kind_is_an_error() {
        let store = store();
        store
            .hash_replace("post:1", &[("title".to_string(), "x".to_string())])
            .await
            .expect("write");
        assert!(matches!(
            store.get("post:1").await,
            Err(KvError::WrongKind { .. })
        ));
    }

    #[tokio::test]
    async fn delete_ignores_missing_keys() {
        let store = store();
        store.set("a", "1", None).await.expect("set");
        store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .expect("delete");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn entries_without_ttl_survive_eviction_pressure() {
        let store = MemoryKvStore::new(NonZeroUsize::new(2).expect("capacity"));
        store.set("registry", "[]", None).await.expect("set");
        store
            .hash_replace("post:1", &[("title".to_string(), "x".to_string())])
            .await
            .expect("write");
        for n in 0..5 {
            store
                .set(&format!("detail.{n}"), "v", Some(Duration::from_secs(60)))
                .await
                .expect("set");
        }

        assert_eq!(store.get("registry").await.expect("get").as_deref(), Some("[]"));
        assert_eq!(store.hash_get_all("post:1").await.expect("read").len(), 1);
        assert_eq!(store.get("detail.0").await.expect("get"), None);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn rewriting_with_ttl_moves_entry_back_under_eviction() {
        let store = MemoryKvStore::new(NonZeroUsize::new(1).expect("capacity"));
        store.set("k", "forever", None).await.expect("set");
        store
            .set("k", "cached", Some(Duration::from_secs(60)))
            .await
            .expect("set");
        store
            .set("other", "v", Some(Duration::from_secs(60)))
            .await
            .expect("set");

        assert_eq!(store.get("k").await.expect("get"), None);
    }
}
