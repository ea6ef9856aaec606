use async_trait::async_trait;
use sqlx::PgConnection;

use crate::{
    application::repos::{RepoError, TagsRepo},
    domain::entities::TagRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    blog_post_id: i64,
    id: i64,
    name: String,
}

/// Fetch or create tags by already-normalized names, preserving input order.
pub(super) async fn upsert_tags(
    conn: &mut PgConnection,
    names: &[String],
) -> Result<Vec<TagRecord>, RepoError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query(
        r#"
        INSERT INTO tags (name)
        SELECT UNNEST($1::text[])
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(names)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let rows = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags WHERE name = ANY($1)")
        .bind(names)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    let mut records = Vec::with_capacity(names.len());
    for name in names {
        let tag = rows
            .iter()
            .find(|row| &row.name == name)
            .ok_or_else(|| RepoError::Integrity {
                message: format!("tag `{name}` missing after upsert"),
            })?;
        records.push(TagRecord {
            id: tag.id,
            name: tag.name.clone(),
        });
    }
    Ok(records)
}

/// Make `tag_ids` the post's exact tag set. Tags themselves are never deleted.
pub(super) async fn replace_post_tags(
    conn: &mut PgConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM blog_post_tag WHERE blog_post_id = $1 AND NOT (tag_id = ANY($2))")
        .bind(post_id)
        .bind(tag_ids)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    sqlx::query(
        r#"
        INSERT INTO blog_post_tag (blog_post_id, tag_id)
        SELECT $1, UNNEST($2::bigint[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

pub(super) async fn tags_for_post(
    conn: &mut PgConnection,
    post_id: i64,
) -> Result<Vec<TagRecord>, RepoError> {
    let rows = sqlx::query_as::<_, TagRow>(
        r#"
        SELECT t.id, t.name
        FROM tags t
        INNER JOIN blog_post_tag pt ON pt.tag_id = t.id
        WHERE pt.blog_post_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(TagRecord::from).collect())
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<TagRecord>, RepoError> {
        let mut conn = self.pool().acquire().await.map_err(map_sqlx_error)?;
        tags_for_post(&mut conn, post_id).await
    }

    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, TagRecord)>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.blog_post_id, t.id, t.name
            FROM blog_post_tag pt
            INNER JOIN tags t ON t.id = pt.tag_id
            WHERE pt.blog_post_id = ANY($1)
            ORDER BY pt.blog_post_id, t.name
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.blog_post_id,
                    TagRecord {
                        id: row.id,
                        name: row.name,
                    },
                )
            })
            .collect())
    }
}
