use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::clock::Clock;
use crate::application::comments::CommentService;
use crate::application::notify::PublishNotifier;
use crate::application::posts::PostService;
use crate::application::scheduler::PublishScheduler;
use crate::application::uploads::ImageStore;
use crate::config::DeploymentEnvironment;

#[derive(Clone)]
pub struct ApiState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub auth: Arc<AuthService>,
    pub scheduler: Arc<PublishScheduler>,
    pub notifier: PublishNotifier,
    pub images: Arc<dyn ImageStore>,
    pub clock: Arc<dyn Clock>,
    pub environment: DeploymentEnvironment,
    pub upload_limit_bytes: usize,
}
