use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::application::pagination::{DEFAULT_PER_PAGE, PageRequest};
use crate::application::posts::{CreatePostCommand, PostView, UpdatePostCommand};
use crate::application::scheduler::SweepReport;
use crate::domain::posts::PublishAtChange;

#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub draft: bool,
}

impl CreatePostRequest {
    pub fn into_command(self, author_id: i64) -> CreatePostCommand {
        CreatePostCommand {
            author_id,
            title: self.title,
            excerpt: self.excerpt,
            description: self.description,
            image_path: blank_to_none(self.image),
            meta_title: blank_to_none(self.meta_title),
            meta_description: blank_to_none(self.meta_description),
            tags: self.tags,
            publish_at: self.published_at,
            draft: self.draft,
        }
    }
}

/// Omitted fields keep their stored values. `published_at` distinguishes
/// omitted from an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "present_timestamp")]
    pub published_at: Option<Option<OffsetDateTime>>,
    #[serde(default)]
    pub draft: bool,
}

impl UpdatePostRequest {
    pub fn into_command(self, id: i64, actor_id: i64) -> UpdatePostCommand {
        UpdatePostCommand {
            id,
            actor_id,
            title: self.title,
            excerpt: self.excerpt,
            description: self.description,
            image_path: blank_to_none(self.image),
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            tags: self.tags,
            publish_at: PublishAtChange::from_optional(self.published_at),
            draft: self.draft,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page(), self.per_page.unwrap_or(DEFAULT_PER_PAGE))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SearchQuery {
    pub fn request(&self) -> PageRequest {
        PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
        .request()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PostEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: PostView,
}

#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    pub message: &'static str,
    pub url: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub message: &'static str,
    pub indexed_posts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub message: &'static str,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub message: &'static str,
    pub report: SweepReport,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Absent, `null` and `""` all mean "no timestamp".
fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Only called when the field is present; `null` or `""` becomes `Some(None)`.
fn present_timestamp<'de, D>(deserializer: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_timestamp(deserializer).map(Some)
}

/// RFC 3339, or a naive `YYYY-MM-DD[ HH:MM[:SS]]` read as UTC.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed);
    }

    let normalized = value.replacen('T', " ", 1);
    let with_seconds = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(parsed) = PrimitiveDateTime::parse(&normalized, with_seconds) {
        return Ok(parsed.assume_utc());
    }
    let without_seconds = format_description!("[year]-[month]-[day] [hour]:[minute]");
    if let Ok(parsed) = PrimitiveDateTime::parse(&normalized, without_seconds) {
        return Ok(parsed.assume_utc());
    }

    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| format!("`{value}` is not a valid date"))
}
