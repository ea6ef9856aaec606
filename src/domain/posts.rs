//! Publish lifecycle rules for posts.
//!
//! A post is `published` exactly when its `published_at` is set and not in the
//! future at the moment its status was last evaluated, `scheduled` when
//! `published_at` lies in the future, and `draft` otherwise. These functions are
//! pure: callers supply the current time and persist the outcome.

use time::OffsetDateTime;

use crate::domain::{entities::PostRecord, error::DomainError, types::PostStatus};

/// How an update request touches the publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishAtChange {
    /// Field omitted: keep the current status and publish time.
    #[default]
    Keep,
    /// Field explicitly cleared: publish immediately.
    Now,
    /// Field set: recompute the status against this instant.
    At(OffsetDateTime),
}

impl PublishAtChange {
    pub fn from_optional(value: Option<Option<OffsetDateTime>>) -> Self {
        match value {
            None => Self::Keep,
            Some(None) => Self::Now,
            Some(Some(at)) => Self::At(at),
        }
    }
}

/// Status, publish time and notification decision produced by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResolution {
    pub status: PostStatus,
    pub published_at: Option<OffsetDateTime>,
    pub notify: bool,
}

impl StatusResolution {
    fn draft() -> Self {
        Self {
            status: PostStatus::Draft,
            published_at: None,
            notify: false,
        }
    }

    fn published_now(now: OffsetDateTime) -> Self {
        Self {
            status: PostStatus::Published,
            published_at: Some(now),
            notify: false,
        }
    }

    fn at(publish_at: OffsetDateTime, now: OffsetDateTime, notify_on_publish: bool) -> Self {
        if publish_at <= now {
            Self {
                status: PostStatus::Published,
                published_at: Some(publish_at),
                notify: notify_on_publish,
            }
        } else {
            Self {
                status: PostStatus::Scheduled,
                published_at: Some(publish_at),
                notify: false,
            }
        }
    }
}

/// Status of a newly created post.
///
/// Omitting the publish time publishes immediately without a notification; an
/// explicit past publish time publishes and notifies; a future one schedules.
pub fn resolve_on_create(
    publish_at: Option<OffsetDateTime>,
    draft: bool,
    now: OffsetDateTime,
) -> StatusResolution {
    if draft {
        return StatusResolution::draft();
    }

    match publish_at {
        None => StatusResolution::published_now(now),
        Some(at) => StatusResolution::at(at, now, true),
    }
}

/// Status of an existing post after an update.
///
/// Notifications fire only on a transition into `published` driven by an
/// explicit past publish time.
pub fn resolve_on_update(
    current: &PostRecord,
    change: PublishAtChange,
    draft: bool,
    now: OffsetDateTime,
) -> Result<StatusResolution, DomainError> {
    if draft {
        if current.status == PostStatus::Published {
            return Err(DomainError::DraftAfterPublish);
        }
        return Ok(StatusResolution::draft());
    }

    let resolution = match change {
        PublishAtChange::Keep => StatusResolution {
            status: current.status,
            published_at: current.published_at,
            notify: false,
        },
        PublishAtChange::Now => StatusResolution::published_now(now),
        PublishAtChange::At(at) => {
            StatusResolution::at(at, now, current.status != PostStatus::Published)
        }
    };

    Ok(resolution)
}

/// Status a due post moves to when the scheduler sweeps it.
pub fn resolve_due(post: &PostRecord, now: OffsetDateTime) -> StatusResolution {
    StatusResolution {
        status: PostStatus::Published,
        published_at: Some(post.published_at.unwrap_or(now)),
        notify: post.status != PostStatus::Published,
    }
}

/// Whether a scheduled post has reached its publish time.
pub fn is_due(post: &PostRecord, now: OffsetDateTime) -> bool {
    post.status == PostStatus::Scheduled && post.published_at.is_some_and(|at| at <= now)
}
