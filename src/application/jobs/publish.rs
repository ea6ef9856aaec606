//! Cron-triggered publish sweep.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::Schedule;
use tracing::{info, warn};

use crate::application::scheduler::PublishScheduler;

/// Marker job emitted by the cron stream on every tick.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct PublishScheduledJob;

impl From<chrono::DateTime<chrono::Utc>> for PublishScheduledJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct PublishScheduledContext {
    pub scheduler: Arc<PublishScheduler>,
}

/// Run one sweep. A failed sweep is logged and left to the next tick rather
/// than retried by the worker.
pub async fn process_publish_scheduled_job(
    _job: PublishScheduledJob,
    ctx: Data<PublishScheduledContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.scheduler.run().await {
        Ok(report) if !report.published.is_empty() || !report.failed.is_empty() => {
            info!(
                target = "application::jobs::process_publish_scheduled_job",
                published = report.published.len(),
                failed = report.failed.len(),
                "publish sweep finished"
            );
        }
        Err(err) => {
            warn!(
                target = "application::jobs::process_publish_scheduled_job",
                error = %err,
                "publish sweep failed"
            );
        }
        _ => {}
    }
    Ok(())
}

/// Parse the sweep schedule (seconds-resolution cron syntax).
pub fn publish_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| err.to_string())
}
