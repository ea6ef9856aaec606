//! Substring search over a per-post field blob kept in the key-value store.
//!
//! Each visible post owns one hash at `post:{id}` with its title, description,
//! excerpt and space-joined tag names. A query scans every entry and keeps the
//! ids whose lowercased blob contains the lowercased query, so a search costs
//! one round trip per indexed post. That is fine for a blog-sized corpus and
//! nothing more.

use std::num::NonZeroU32;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::clock::Clock;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{PostsRepo, RepoError, TagsRepo, group_by_post};
use crate::cache::{KvError, KvStore, SEARCH_NAMESPACE, post_id_from_search_key, search_key};
use crate::domain::entities::{PostRecord, TagRecord};

const SOURCE: &str = "application::search";

const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_EXCERPT: &str = "excerpt";
const FIELD_TAGS: &str = "tags";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Outcome of a full rebuild. A failure part-way leaves the entries written so
/// far in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub indexed: u64,
    pub failure: Option<String>,
}

#[derive(Clone)]
pub struct SearchIndex {
    store: Arc<dyn KvStore>,
    posts: Arc<dyn PostsRepo>,
    tags: Arc<dyn TagsRepo>,
    clock: Arc<dyn Clock>,
    rebuild_batch_size: NonZeroU32,
}

impl SearchIndex {
    pub fn new(
        store: Arc<dyn KvStore>,
        posts: Arc<dyn PostsRepo>,
        tags: Arc<dyn TagsRepo>,
        clock: Arc<dyn Clock>,
        rebuild_batch_size: NonZeroU32,
    ) -> Self {
        Self {
            store,
            posts,
            tags,
            clock,
            rebuild_batch_size,
        }
    }

    /// Replace the entry of a visible post, or drop it when the post is not visible.
    pub async fn index_post(&self, post: &PostRecord, tags: &[TagRecord]) -> Result<(), SearchError> {
        if !post.is_visible_at(self.clock.now()) {
            return self.remove_post(post.id).await;
        }

        self.store
            .hash_replace(&search_key(post.id), &entry_fields(post, tags))
            .await?;
        debug!(target = SOURCE, post_id = post.id, "search entry written");
        Ok(())
    }

    /// [`SearchIndex::index_post`] with the post's current tags loaded first.
    pub async fn reindex(&self, post: &PostRecord) -> Result<(), SearchError> {
        let tags = self.tags.list_for_post(post.id).await?;
        self.index_post(post, &tags).await
    }

    pub async fn remove_post(&self, post_id: i64) -> Result<(), SearchError> {
        self.store.delete(&[search_key(post_id)]).await?;
        debug!(target = SOURCE, post_id, "search entry removed");
        Ok(())
    }

    /// A blank query returns the plain reverse-chronological listing and never
    /// touches the index. Otherwise the filtered id list is paginated first and
    /// only the page's posts are loaded.
    pub async fn search(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, SearchError> {
        let now = self.clock.now();
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(self.posts.list_recent(now, page).await?);
        }

        counter!("quire_search_queries_total").increment(1);
        let ids = self.matching_ids(&needle).await?;
        let total = ids.len() as u64;
        let page_ids = page.slice(&ids);
        let posts = if page_ids.is_empty() {
            Vec::new()
        } else {
            self.posts.list_visible_by_ids(page_ids, now).await?
        };

        Ok(Page::new(posts, page, total))
    }

    /// Clear every entry, then index all visible posts in keyset batches.
    pub async fn rebuild(&self) -> RebuildReport {
        let mut report = RebuildReport::default();
        if let Err(err) = self.rebuild_into(&mut report).await {
            warn!(
                target = SOURCE,
                indexed = report.indexed,
                error = %err,
                "search index rebuild stopped early"
            );
            report.failure = Some(err.to_string());
        } else {
            info!(target = SOURCE, indexed = report.indexed, "search index rebuilt");
        }
        report
    }

    async fn rebuild_into(&self, report: &mut RebuildReport) -> Result<(), SearchError> {
        let stale = self.store.scan_prefix(SEARCH_NAMESPACE).await?;
        if !stale.is_empty() {
            self.store.delete(&stale).await?;
        }

        let limit = self.rebuild_batch_size.get();
        let mut after = None;
        loop {
            let now = self.clock.now();
            let batch = self.posts.list_visible_after(after, limit, now).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id);

            let ids: Vec<i64> = batch.iter().map(|post| post.id).collect();
            let mut tags = group_by_post(self.tags.list_for_posts(&ids).await?);
            for post in &batch {
                let post_tags = tags.remove(&post.id).unwrap_or_default();
                self.index_post(post, &post_tags).await?;
                report.indexed += 1;
            }

            if batch.len() < limit as usize {
                break;
            }
        }
        Ok(())
    }

    /// Ids of indexed posts whose blob contains `needle`, newest id first.
    async fn matching_ids(&self, needle: &str) -> Result<Vec<i64>, SearchError> {
        let keys = self.store.scan_prefix(SEARCH_NAMESPACE).await?;
        let mut ids = Vec::new();
        for key in keys {
            let Some(post_id) = post_id_from_search_key(&key) else {
                debug!(target = SOURCE, key = %key, "skipping foreign key in search namespace");
                continue;
            };
            let fields = self.store.hash_get_all(&key).await?;
            if search_blob(&fields).contains(needle) {
                ids.push(post_id);
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }
}

fn entry_fields(post: &PostRecord, tags: &[TagRecord]) -> Vec<(String, String)> {
    let tag_names = tags
        .iter()
        .map(|tag| tag.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    vec![
        (FIELD_TITLE.to_string(), post.title.clone()),
        (FIELD_DESCRIPTION.to_string(), post.description.clone()),
        (FIELD_EXCERPT.to_string(), post.excerpt.clone()),
        (FIELD_TAGS.to_string(), tag_names),
    ]
}

fn search_blob(fields: &std::collections::HashMap<String, String>) -> String {
    let field = |name: &str| fields.get(name).map(String::as_str).unwrap_or_default();
    format!(
        "{} {} {} {}",
        field(FIELD_TITLE),
        field(FIELD_DESCRIPTION),
        field(FIELD_EXCERPT),
        field(FIELD_TAGS)
    )
    .to_lowercase()
}
