use std::sync::Arc;

use crate::application::clock::Clock;
use crate::application::notify::PublishNotifier;
use crate::application::repos::{CommentsRepo, PostsRepo, PostsWriteRepo, TagsRepo};
use crate::application::search::SearchIndex;
use crate::application::uploads::ImageStore;
use crate::cache::ReadCaches;

/// Post lifecycle orchestration: persistence first, then the derived search
/// entry, caches and notifications, whose failures are logged and ignored.
#[derive(Clone)]
pub struct PostService {
    pub(crate) reader: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) tags: Arc<dyn TagsRepo>,
    pub(crate) comments: Arc<dyn CommentsRepo>,
    pub(crate) search: SearchIndex,
    pub(crate) notifier: PublishNotifier,
    pub(crate) caches: ReadCaches,
    pub(crate) images: Arc<dyn ImageStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) index_per_page: u32,
}

/// Collaborators of [`PostService`].
pub struct PostServiceDeps {
    pub reader: Arc<dyn PostsRepo>,
    pub writer: Arc<dyn PostsWriteRepo>,
    pub tags: Arc<dyn TagsRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub search: SearchIndex,
    pub notifier: PublishNotifier,
    pub caches: ReadCaches,
    pub images: Arc<dyn ImageStore>,
    pub clock: Arc<dyn Clock>,
}

impl PostService {
    pub fn new(deps: PostServiceDeps, index_per_page: u32) -> Self {
        let PostServiceDeps {
            reader,
            writer,
            tags,
            comments,
            search,
            notifier,
            caches,
            images,
            clock,
        } = deps;
        Self {
            reader,
            writer,
            tags,
            comments,
            search,
            notifier,
            caches,
            images,
            clock,
            index_per_page,
        }
    }

    pub fn caches(&self) -> &ReadCaches {
        &self.caches
    }

    pub fn search_index(&self) -> &SearchIndex {
        &self.search
    }
}
