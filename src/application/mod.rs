//! Application services layer.

pub mod auth;
pub mod clock;
pub mod comments;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod notify;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod scheduler;
pub mod search;
pub mod soft;
pub mod uploads;
