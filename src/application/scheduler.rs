//! Sweep that moves due scheduled posts to published.
//!
//! Triggered once per minute by the cron worker (or on demand). Overlapping
//! sweeps are not serialized: two sweeps that read the same due set will both
//! publish the same post, and each will enqueue a notification for it.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{error, info};

use crate::application::clock::Clock;
use crate::application::notify::PublishNotifier;
use crate::application::repos::{PostsRepo, PostsWriteRepo, RepoError};
use crate::application::search::SearchIndex;
use crate::application::soft::SoftFailure;
use crate::cache::ReadCaches;
use crate::domain::posts::resolve_due;

const SOURCE: &str = "application::scheduler";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Ids of posts moved to published by this sweep.
    pub published: Vec<i64>,
    /// Ids of due posts whose transition failed; the next sweep retries them.
    pub failed: Vec<i64>,
}

#[derive(Clone)]
pub struct PublishScheduler {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    search: SearchIndex,
    notifier: PublishNotifier,
    caches: ReadCaches,
    clock: Arc<dyn Clock>,
}

impl PublishScheduler {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        search: SearchIndex,
        notifier: PublishNotifier,
        caches: ReadCaches,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            writer,
            search,
            notifier,
            caches,
            clock,
        }
    }

    /// Publish every due post. Only the due-set lookup can fail the sweep as a
    /// whole; per-post failures are recorded in the report.
    pub async fn run(&self) -> Result<SweepReport, RepoError> {
        let now = self.clock.now();
        let due = self.posts.list_due(now).await?;
        let mut report = SweepReport::default();

        for post in due {
            let resolution = resolve_due(&post, now);
            let published_at = resolution.published_at.unwrap_or(now);
            let published = match self.writer.mark_published(post.id, published_at, now).await {
                Ok(published) => published,
                Err(err) => {
                    error!(
                        target = SOURCE,
                        post_id = post.id,
                        error = %err,
                        "failed to publish due post"
                    );
                    report.failed.push(post.id);
                    continue;
                }
            };

            self.caches.forget_post(published.id).await;
            self.search
                .reindex(&published)
                .await
                .soft(SOURCE, "index_published_post");
            if resolution.notify {
                self.notifier.post_published(&published).await;
            }

            counter!("quire_posts_published_total", "trigger" => "schedule").increment(1);
            info!(target = SOURCE, post_id = published.id, "scheduled post published");
            report.published.push(published.id);
        }

        if !report.published.is_empty() {
            self.caches.invalidate_listings().await;
        }

        Ok(report)
    }
}
