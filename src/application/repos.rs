//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord, UserRecord};
use crate::domain::types::{JobType, PostStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Editable post fields shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFields {
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image_path: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub fields: PostFields,
    pub status: PostStatus,
    pub published_at: Option<OffsetDateTime>,
    /// Normalized tag names, get-or-created and attached with the row.
    pub tags: Vec<String>,
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub fields: PostFields,
    pub status: PostStatus,
    pub published_at: Option<OffsetDateTime>,
    /// `None` keeps the current tag set.
    pub tags: Option<Vec<String>>,
    pub now: OffsetDateTime,
}

/// A post row together with the tags attached in the same write.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPost {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    /// Visible posts ordered by `published_at` descending.
    async fn list_published(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    /// Visible posts ordered by `created_at` descending.
    async fn list_recent(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    /// Every post of one author regardless of status, newest first.
    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    /// Visible posts among `ids`, ordered by `created_at` descending.
    async fn list_visible_by_ids(
        &self,
        ids: &[i64],
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Keyset batch of visible posts with `id > after`, ordered by id.
    async fn list_visible_after(
        &self,
        after: Option<i64>,
        limit: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Scheduled posts whose publish time is at or before `now`.
    async fn list_due(&self, now: OffsetDateTime) -> Result<Vec<PostRecord>, RepoError>;

    async fn list_all(&self) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert the row and attach its tags atomically: on error nothing is stored.
    async fn create_post(&self, params: CreatePostParams) -> Result<SavedPost, RepoError>;

    /// Update the row and its tag set atomically.
    async fn update_post(&self, params: UpdatePostParams) -> Result<SavedPost, RepoError>;

    /// Unconditionally set the post to published at `published_at`.
    async fn mark_published(
        &self,
        id: i64,
        published_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<PostRecord, RepoError>;

    /// Remove the post, its tag links and its comments.
    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<TagRecord>, RepoError>;

    /// Tags of several posts as `(post_id, tag)` pairs.
    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, TagRecord)>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub now: OffsetDateTime,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError>;

    /// Comments of one post in insertion order.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    /// Comment totals as `(post_id, count)`; posts without comments may be absent.
    async fn count_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, i64)>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub token_hash: String,
    pub now: OffsetDateTime,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Push a job onto the queue, returning its identifier.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}

/// Group `(post_id, item)` pairs produced by the batch lookups above.
pub fn group_by_post<T>(pairs: Vec<(i64, T)>) -> HashMap<i64, Vec<T>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for (post_id, item) in pairs {
        grouped.entry(post_id).or_default().push(item);
    }
    grouped
}
