use metrics::counter;
use tracing::info;

use crate::application::repos::{CreatePostParams, PostFields, SavedPost, UpdatePostParams};
use crate::application::soft::SoftFailure;
use crate::domain::entities::{PostRecord, TagRecord};
use crate::domain::error::{ensure_max_chars, ensure_present};
use crate::domain::posts::{resolve_on_create, resolve_on_update};
use crate::domain::tags::normalize_tag_names;
use crate::domain::types::PostStatus;

use super::service::PostService;
use super::types::{
    CreatePostCommand, MAX_TITLE_LEN, PostServiceError, PostView, UpdatePostCommand, ViewParts,
};

const SOURCE: &str = "application::posts::commands";

impl PostService {
    pub async fn create_post(&self, command: CreatePostCommand) -> Result<PostView, PostServiceError> {
        ensure_present(&command.title, "title")?;
        ensure_max_chars(&command.title, "title", MAX_TITLE_LEN)?;
        ensure_present(&command.excerpt, "excerpt")?;
        ensure_present(&command.description, "description")?;
        if let Some(meta_title) = command.meta_title.as_deref() {
            ensure_max_chars(meta_title, "meta_title", MAX_TITLE_LEN)?;
        }

        let now = self.clock.now();
        let resolution = resolve_on_create(command.publish_at, command.draft, now);

        let SavedPost { post, tags } = self
            .writer
            .create_post(CreatePostParams {
                author_id: command.author_id,
                fields: PostFields {
                    title: command.title,
                    excerpt: command.excerpt,
                    description: command.description,
                    image_path: command.image_path,
                    meta_title: command.meta_title,
                    meta_description: command.meta_description,
                },
                status: resolution.status,
                published_at: resolution.published_at,
                tags: normalize_tag_names(&command.tags),
                now,
            })
            .await?;

        self.search
            .index_post(&post, &tags)
            .await
            .soft(SOURCE, "index_created_post");
        if resolution.notify {
            self.notifier.post_published(&post).await;
        }
        if post.status == PostStatus::Published {
            counter!("quire_posts_published_total", "trigger" => "create").increment(1);
        }
        self.caches.after_post_write(post.id).await;

        info!(
            target = SOURCE,
            post_id = post.id,
            status = %post.status,
            "post created"
        );
        Ok(self.view(post, &tags, 0))
    }

    pub async fn update_post(&self, command: UpdatePostCommand) -> Result<PostView, PostServiceError> {
        let current = self.owned_post(command.id, command.actor_id).await?;

        for (value, field) in [
            (command.title.as_deref(), "title"),
            (command.excerpt.as_deref(), "excerpt"),
            (command.description.as_deref(), "description"),
        ] {
            if let Some(value) = value {
                ensure_present(value, field)?;
            }
        }
        if let Some(title) = command.title.as_deref() {
            ensure_max_chars(title, "title", MAX_TITLE_LEN)?;
        }

        let now = self.clock.now();
        let resolution = resolve_on_update(&current, command.publish_at, command.draft, now)?;

        let replaced_image = match (&command.image_path, &current.image_path) {
            (Some(new), Some(old)) if new != old => Some(old.clone()),
            _ => None,
        };

        let fields = PostFields {
            title: command.title.unwrap_or_else(|| current.title.clone()),
            excerpt: command.excerpt.unwrap_or_else(|| current.excerpt.clone()),
            description: command
                .description
                .unwrap_or_else(|| current.description.clone()),
            image_path: command.image_path.or_else(|| current.image_path.clone()),
            meta_title: command.meta_title.or_else(|| current.meta_title.clone()),
            meta_description: command
                .meta_description
                .or_else(|| current.meta_description.clone()),
        };

        // An absent or effectively empty tag list keeps the current tags.
        let tags = command
            .tags
            .as_deref()
            .map(normalize_tag_names)
            .filter(|names| !names.is_empty());

        let SavedPost { post, tags } = self
            .writer
            .update_post(UpdatePostParams {
                id: current.id,
                fields,
                status: resolution.status,
                published_at: resolution.published_at,
                tags,
                now,
            })
            .await?;

        if let Some(old) = replaced_image {
            self.images
                .delete(&old)
                .await
                .soft(SOURCE, "delete_replaced_image");
        }
        self.search
            .index_post(&post, &tags)
            .await
            .soft(SOURCE, "index_updated_post");
        if resolution.notify {
            self.notifier.post_published(&post).await;
        }
        if current.status != PostStatus::Published && post.status == PostStatus::Published {
            counter!("quire_posts_published_total", "trigger" => "update").increment(1);
        }
        self.caches.after_post_write(post.id).await;

        let comments_count = self.comment_counts(&[post.id]).await?.remove(&post.id);
        info!(
            target = SOURCE,
            post_id = post.id,
            status = %post.status,
            "post updated"
        );
        Ok(self.view(post, &tags, comments_count.unwrap_or(0)))
    }

    pub async fn delete_post(&self, id: i64, actor_id: i64) -> Result<(), PostServiceError> {
        let post = self.owned_post(id, actor_id).await?;

        self.writer.delete_post(post.id).await?;

        if let Some(image) = post.image_path.as_deref() {
            self.images
                .delete(image)
                .await
                .soft(SOURCE, "delete_post_image");
        }
        self.search
            .remove_post(post.id)
            .await
            .soft(SOURCE, "remove_deleted_post");
        self.caches.after_post_write(post.id).await;

        info!(target = SOURCE, post_id = post.id, "post deleted");
        Ok(())
    }

    /// Load a post the actor is allowed to modify.
    async fn owned_post(&self, id: i64, actor_id: i64) -> Result<PostRecord, PostServiceError> {
        let post = self
            .reader
            .find_post(id)
            .await?
            .ok_or(PostServiceError::NotFound)?;
        if post.author_id != actor_id {
            return Err(PostServiceError::Forbidden);
        }
        Ok(post)
    }

    pub(crate) fn view(&self, post: PostRecord, tags: &[TagRecord], comments_count: i64) -> PostView {
        let image_url = post
            .image_path
            .as_deref()
            .map(|path| self.images.public_url(path));
        PostView::from(ViewParts {
            post,
            tags,
            comments_count,
            comments: None,
            image_url,
        })
    }
}
