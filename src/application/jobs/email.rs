//! Delivery worker for publish notifications.

use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use tracing::info;

use crate::application::mail::{MailTransport, MailerConfig, render_published_email};
use crate::application::notify::PublishedPostNotice;

use super::context::job_failed;

#[derive(Clone)]
pub struct EmailJobContext {
    pub transport: Arc<dyn MailTransport>,
    pub mailer: MailerConfig,
}

/// Render and hand the message to the transport. Failures are returned to the
/// worker so the job is retried up to its attempt limit.
pub async fn process_send_published_email_job(
    notice: PublishedPostNotice,
    ctx: Data<EmailJobContext>,
) -> Result<(), ApalisError> {
    let email = render_published_email(&notice, &ctx.mailer).map_err(job_failed)?;
    ctx.transport.send(&email).await.map_err(job_failed)?;

    info!(
        target = "application::jobs::process_send_published_email_job",
        post_id = notice.post_id,
        recipient = %notice.recipient_email,
        "publish notification delivered"
    );
    Ok(())
}
