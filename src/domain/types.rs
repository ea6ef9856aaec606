//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SendPublishedEmail,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SendPublishedEmail => "send_published_email",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "send_published_email" => Ok(JobType::SendPublishedEmail),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_status_serializes_snake_case() {
        let json = serde_json::to_string(&PostStatus::Scheduled).expect("serialize");
        assert_eq!(json, "\"scheduled\"");
        assert_eq!(PostStatus::Published.to_string(), "published");
    }

    #[test]
    fn job_type_round_trips_through_str() {
        let kind = JobType::SendPublishedEmail;
        assert_eq!(JobType::try_from(kind.as_str()), Ok(kind));
        assert!(JobType::try_from("render_post").is_err());
    }
}
