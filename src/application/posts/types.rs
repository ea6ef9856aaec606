use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::pagination::Page;
use crate::application::repos::RepoError;
use crate::application::search::SearchError;
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::PublishAtChange;
use crate::domain::types::PostStatus;

pub const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post not found")]
    NotFound,
    #[error("not allowed to modify this post")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<DomainError> for PostServiceError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreatePostCommand {
    pub author_id: i64,
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image_path: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Vec<String>,
    pub publish_at: Option<OffsetDateTime>,
    pub draft: bool,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostCommand {
    pub id: i64,
    pub actor_id: i64,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    /// Replaces the tag set only when non-empty.
    pub tags: Option<Vec<String>>,
    pub publish_at: PublishAtChange,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRecord> for CommentView {
    fn from(comment: CommentRecord) -> Self {
        Self {
            id: comment.id,
            user_id: comment.author_id,
            author_name: comment.author_name,
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

/// Post resource as returned by the API and stored in the read caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub status: PostStatus,
    pub comments_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentView>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostView {
    pub fn is_visible_at(&self, now: OffsetDateTime) -> bool {
        self.status == PostStatus::Published
            && self.published_at.is_some_and(|published| published <= now)
    }
}

/// Borrowed pieces a [`PostView`] is assembled from.
pub(crate) struct ViewParts<'a> {
    pub post: PostRecord,
    pub tags: &'a [TagRecord],
    pub comments_count: i64,
    pub comments: Option<Vec<CommentRecord>>,
    pub image_url: Option<String>,
}

impl From<ViewParts<'_>> for PostView {
    fn from(parts: ViewParts<'_>) -> Self {
        let ViewParts {
            post,
            tags,
            comments_count,
            comments,
            image_url,
        } = parts;
        Self {
            id: post.id,
            user_id: post.author_id,
            title: post.title,
            excerpt: post.excerpt,
            description: post.description,
            image_url,
            tags: tags.iter().map(|tag| tag.name.clone()).collect(),
            meta_title: post.meta_title,
            meta_description: post.meta_description,
            published_at: post.published_at,
            status: post.status,
            comments_count,
            comments: comments.map(|list| list.into_iter().map(CommentView::from).collect()),
            created_at: post.created_at,
        }
    }
}

/// A listing page plus whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListing {
    #[serde(flatten)]
    pub page: Page<PostView>,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostStatusLine {
    pub id: i64,
    pub title: String,
    pub status: PostStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub is_published: bool,
    pub is_scheduled: bool,
    pub is_draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostStatusReport {
    #[serde(with = "time::serde::rfc3339")]
    pub now: OffsetDateTime,
    pub posts: Vec<PostStatusLine>,
}
