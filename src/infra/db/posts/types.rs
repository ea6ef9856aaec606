use time::OffsetDateTime;

use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

/// Column list matching [`PostRow`], for queries over `blog_posts p`.
pub(crate) const POST_COLUMNS: &str = "p.id, p.user_id, p.title, p.excerpt, p.description, \
     p.image, p.meta_title, p.meta_description, p.status, p.published_at, \
     p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) title: String,
    pub(crate) excerpt: String,
    pub(crate) description: String,
    pub(crate) image: Option<String>,
    pub(crate) meta_title: Option<String>,
    pub(crate) meta_description: Option<String>,
    pub(crate) status: PostStatus,
    pub(crate) published_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.user_id,
            title: row.title,
            excerpt: row.excerpt,
            description: row.description,
            image_path: row.image,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            status: row.status,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
