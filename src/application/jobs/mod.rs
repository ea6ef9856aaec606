mod context;
mod email;
mod publish;
mod queue;

pub use context::job_failed;
pub use email::{EmailJobContext, process_send_published_email_job};
pub use publish::{
    PublishScheduledContext, PublishScheduledJob, process_publish_scheduled_job, publish_schedule,
};
pub use queue::enqueue_job;
