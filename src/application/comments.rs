//! Comment creation and removal. Comments are immutable once written.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::clock::Clock;
use crate::application::posts::CommentView;
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::cache::ReadCaches;
use crate::domain::entities::UserRecord;

const SOURCE: &str = "application::comments";

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum CommentServiceError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    NotFound,
    #[error("not allowed to delete this comment")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    caches: ReadCaches,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        caches: ReadCaches,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            comments,
            caches,
            clock,
        }
    }

    /// Comment on a post visible to the author of the comment.
    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &UserRecord,
        content: &str,
    ) -> Result<CommentView, CommentServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::Validation(
                "content is required".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(CommentServiceError::Validation(format!(
                "content must be at most {MAX_COMMENT_LEN} characters"
            )));
        }

        let now = self.clock.now();
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .filter(|post| post.is_visible_at(now) || post.author_id == author.id)
            .ok_or(CommentServiceError::PostNotFound)?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                content: content.to_string(),
                now,
            })
            .await?;
        self.caches.after_post_write(post.id).await;

        info!(
            target = SOURCE,
            post_id = post.id,
            comment_id = comment.id,
            "comment added"
        );
        Ok(CommentView::from(comment))
    }

    pub async fn delete_comment(
        &self,
        comment_id: i64,
        actor_id: i64,
    ) -> Result<(), CommentServiceError> {
        let comment = self
            .comments
            .find_comment(comment_id)
            .await?
            .ok_or(CommentServiceError::NotFound)?;
        if comment.author_id != actor_id {
            return Err(CommentServiceError::Forbidden);
        }

        self.comments.delete_comment(comment.id).await?;
        self.caches.after_post_write(comment.post_id).await;

        info!(
            target = SOURCE,
            post_id = comment.post_id,
            comment_id = comment.id,
            "comment deleted"
        );
        Ok(())
    }
}
