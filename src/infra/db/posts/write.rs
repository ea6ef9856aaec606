use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostsWriteRepo, RepoError, SavedPost, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

use super::types::PostRow;
use crate::infra::db::tags::{replace_post_tags, tags_for_post, upsert_tags};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

const RETURNING: &str = "RETURNING id, user_id, title, excerpt, description, image, meta_title, \
     meta_description, status, published_at, created_at, updated_at";

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<SavedPost, RepoError> {
        let CreatePostParams {
            author_id,
            fields,
            status,
            published_at,
            tags,
            now,
        } = params;

        let sql = format!(
            "INSERT INTO blog_posts (
                user_id, title, excerpt, description, image, meta_title, meta_description,
                status, published_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            {RETURNING}"
        );
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_id)
            .bind(fields.title)
            .bind(fields.excerpt)
            .bind(fields.description)
            .bind(fields.image_path)
            .bind(fields.meta_title)
            .bind(fields.meta_description)
            .bind(status)
            .bind(published_at)
            .bind(now)
            .fetch_one(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        let post = PostRecord::from(row);

        let tags = upsert_tags(tx.as_mut(), &tags).await?;
        if !tags.is_empty() {
            let ids: Vec<i64> = tags.iter().map(|tag| tag.id).collect();
            replace_post_tags(tx.as_mut(), post.id, &ids).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(SavedPost { post, tags })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<SavedPost, RepoError> {
        let UpdatePostParams {
            id,
            fields,
            status,
            published_at,
            tags,
            now,
        } = params;

        let sql = format!(
            "UPDATE blog_posts
                SET title = $2,
                    excerpt = $3,
                    description = $4,
                    image = $5,
                    meta_title = $6,
                    meta_description = $7,
                    status = $8,
                    published_at = $9,
                    updated_at = $10
              WHERE id = $1
            {RETURNING}"
        );
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(fields.title)
            .bind(fields.excerpt)
            .bind(fields.description)
            .bind(fields.image_path)
            .bind(fields.meta_title)
            .bind(fields.meta_description)
            .bind(status)
            .bind(published_at)
            .bind(now)
            .fetch_optional(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        let post = row.map(PostRecord::from).ok_or(RepoError::NotFound)?;

        let tags = match tags {
            Some(names) => {
                let tags = upsert_tags(tx.as_mut(), &names).await?;
                let ids: Vec<i64> = tags.iter().map(|tag| tag.id).collect();
                replace_post_tags(tx.as_mut(), post.id, &ids).await?;
                tags
            }
            None => tags_for_post(tx.as_mut(), post.id).await?,
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(SavedPost { post, tags })
    }

    async fn mark_published(
        &self,
        id: i64,
        published_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "UPDATE blog_posts
                SET status = $2,
                    published_at = $3,
                    updated_at = $4
              WHERE id = $1
            {RETURNING}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(PostStatus::Published)
            .bind(published_at)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
