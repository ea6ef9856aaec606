//! Publish notifications.
//!
//! Dispatch only enqueues: delivery happens later in the email worker with
//! at-least-once semantics, and callers never wait for it.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::jobs::enqueue_job;
use crate::application::repos::{JobsRepo, RepoError, UsersRepo};
use crate::application::soft::SoftFailure;
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::types::JobType;

const SOURCE: &str = "application::notify";

const EMAIL_MAX_ATTEMPTS: i32 = 5;
const EMAIL_PRIORITY: i32 = 5;

const TEST_POST_ID: i64 = 999;
const TEST_POST_TITLE: &str = "Test Post for Email";
const TEST_RECIPIENT_NAME: &str = "Test User";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to enqueue notification: {0}")]
    Enqueue(#[from] RepoError),
    #[error("author {author_id} of post {post_id} not found")]
    MissingAuthor { post_id: i64, author_id: i64 },
}

/// Everything the email worker needs without reading the post again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPostNotice {
    pub post_id: i64,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub recipient_email: String,
    pub recipient_name: String,
}

impl PublishedPostNotice {
    pub fn new(post: &PostRecord, recipient: &UserRecord) -> Self {
        Self {
            post_id: post.id,
            title: post.title.clone(),
            description: post.description.clone(),
            published_at: post.published_at,
            recipient_email: recipient.email.clone(),
            recipient_name: recipient.name.clone(),
        }
    }
}

#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn enqueue(&self, notice: PublishedPostNotice) -> Result<(), NotifyError>;
}

/// Dispatch backed by the job queue.
#[derive(Clone)]
pub struct JobNotificationDispatch {
    jobs: Arc<dyn JobsRepo>,
}

impl JobNotificationDispatch {
    pub fn new(jobs: Arc<dyn JobsRepo>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl NotificationDispatch for JobNotificationDispatch {
    async fn enqueue(&self, notice: PublishedPostNotice) -> Result<(), NotifyError> {
        let job_id = enqueue_job(
            self.jobs.as_ref(),
            JobType::SendPublishedEmail,
            &notice,
            None,
            EMAIL_MAX_ATTEMPTS,
            EMAIL_PRIORITY,
        )
        .await?;

        counter!("quire_notifications_enqueued_total").increment(1);
        info!(
            target = SOURCE,
            job_id = %job_id,
            post_id = notice.post_id,
            "publish notification enqueued"
        );
        Ok(())
    }
}

/// Resolves the author of a freshly published post and dispatches the notice.
/// Every failure is logged and swallowed.
#[derive(Clone)]
pub struct PublishNotifier {
    users: Arc<dyn UsersRepo>,
    dispatch: Arc<dyn NotificationDispatch>,
}

impl PublishNotifier {
    pub fn new(users: Arc<dyn UsersRepo>, dispatch: Arc<dyn NotificationDispatch>) -> Self {
        Self { users, dispatch }
    }

    /// Enqueue a notice for a synthetic post so mail delivery can be checked
    /// end to end. Unlike real notifications, failures are returned.
    pub async fn send_test(
        &self,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<PublishedPostNotice, NotifyError> {
        let notice = PublishedPostNotice {
            post_id: TEST_POST_ID,
            title: TEST_POST_TITLE.to_string(),
            description: "This is a test post used to verify publish notifications.".to_string(),
            published_at: Some(now),
            recipient_email: email.trim().to_string(),
            recipient_name: TEST_RECIPIENT_NAME.to_string(),
        };
        self.dispatch.enqueue(notice.clone()).await?;
        Ok(notice)
    }

    pub async fn post_published(&self, post: &PostRecord) {
        self.try_notify(post)
            .await
            .soft(SOURCE, "notify_post_published");
    }

    async fn try_notify(&self, post: &PostRecord) -> Result<(), NotifyError> {
        let author = self.users.find_user(post.author_id).await?;
        let Some(author) = author else {
            return Err(NotifyError::MissingAuthor {
                post_id: post.id,
                author_id: post.author_id,
            });
        };

        self.dispatch
            .enqueue(PublishedPostNotice::new(post, &author))
            .await
    }
}
