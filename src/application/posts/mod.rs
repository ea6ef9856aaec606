mod commands;
mod queries;
mod service;
pub mod types;

pub use service::{PostService, PostServiceDeps};
pub use types::{
    CommentView, CreatePostCommand, PostListing, PostServiceError, PostStatusLine,
    PostStatusReport, PostView, UpdatePostCommand,
};
