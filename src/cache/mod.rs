//! Read-path caches.
//!
//! - **Search listings** (`blog:list:`): pages of the reverse-chronological
//!   listing keyed by page and page size.
//! - **Index pages** (`blog_posts.`): pages of the published-post index.
//! - **Post details** (`blog_post.{id}`): a single post with tags and comments.
//!
//! Both listing namespaces keep a master registry so a write can drop every
//! cached page at once. All entries also expire on their own TTL.

mod config;
mod entry;
mod keys;
mod list;
pub(crate) mod lock;
mod store;

use std::sync::Arc;

pub use config::CacheConfig;
pub use entry::{CacheError, EntryCache};
pub use keys::{
    DETAIL_NAMESPACE, INDEX_NAMESPACE, LIST_NAMESPACE, REGISTRY_SUFFIX, SEARCH_NAMESPACE,
    detail_key, index_page_key, list_page_key, post_id_from_search_key, search_key,
};
pub use list::ListCache;
pub use store::{KvError, KvStore, MemoryKvStore};

use crate::application::soft::SoftFailure;

const SOURCE: &str = "cache::read_caches";

/// The caches a post or comment write must keep consistent.
#[derive(Clone)]
pub struct ReadCaches {
    pub lists: ListCache,
    pub index: ListCache,
    pub details: EntryCache,
}

impl ReadCaches {
    pub fn new(store: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            lists: ListCache::new(store.clone(), LIST_NAMESPACE, config.list_ttl),
            index: ListCache::new(store.clone(), INDEX_NAMESPACE, config.page_ttl),
            details: EntryCache::new(store, DETAIL_NAMESPACE, config.detail_ttl),
        }
    }

    /// Drop every cached listing page in both namespaces.
    pub async fn invalidate_listings(&self) {
        self.lists
            .invalidate_all()
            .await
            .soft(SOURCE, "invalidate_search_listings");
        self.index
            .invalidate_all()
            .await
            .soft(SOURCE, "invalidate_index_pages");
    }

    pub async fn forget_post(&self, post_id: i64) {
        self.details
            .forget(&detail_key(post_id))
            .await
            .soft(SOURCE, "forget_post_detail");
    }

    /// Consistency step shared by every post and comment mutation.
    pub async fn after_post_write(&self, post_id: i64) {
        self.forget_post(post_id).await;
        self.invalidate_listings().await;
    }
}
