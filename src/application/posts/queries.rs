use std::collections::HashMap;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::group_by_post;
use crate::application::soft::SoftFailure;
use crate::cache::{detail_key, index_page_key, list_page_key};
use crate::domain::entities::PostRecord;

use super::service::PostService;
use super::types::{
    PostListing, PostServiceError, PostStatusLine, PostStatusReport, PostView, ViewParts,
};

const SOURCE: &str = "application::posts::queries";

impl PostService {
    /// Published posts, newest publish time first, cached per page.
    pub async fn index_page(&self, page: u32) -> Result<Page<PostView>, PostServiceError> {
        let request = PageRequest::new(page, self.index_per_page);
        let key = index_page_key(request.page);
        if let Some(cached) = self
            .caches
            .index
            .get::<Page<PostView>>(&key)
            .await
            .soft(SOURCE, "read_index_page")
            .flatten()
        {
            return Ok(cached);
        }

        let records = self.reader.list_published(self.clock.now(), request).await?;
        let page = self.hydrate_page(records).await?;
        // Pages past the end are not cached so arbitrary page numbers cannot
        // grow the registry.
        if !page.meta.is_past_end() {
            self.caches
                .index
                .set(&key, &page)
                .await
                .soft(SOURCE, "write_index_page");
        }
        Ok(page)
    }

    /// A blank query serves the cached reverse-chronological listing; any other
    /// query goes to the search index and is never cached.
    pub async fn search(
        &self,
        query: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<PostListing, PostServiceError> {
        let request = PageRequest::new(page, per_page);
        let query = query.map(str::trim).unwrap_or_default();

        if !query.is_empty() {
            let records = self.search.search(query, request).await?;
            return Ok(PostListing {
                page: self.hydrate_page(records).await?,
                from_cache: false,
            });
        }

        let key = list_page_key(request.page, request.per_page);
        if let Some(cached) = self
            .caches
            .lists
            .get::<Page<PostView>>(&key)
            .await
            .soft(SOURCE, "read_listing_page")
            .flatten()
        {
            return Ok(PostListing {
                page: cached,
                from_cache: true,
            });
        }

        let records = self.search.search("", request).await?;
        let page = self.hydrate_page(records).await?;
        if !page.meta.is_past_end() {
            self.caches
                .lists
                .set(&key, &page)
                .await
                .soft(SOURCE, "write_listing_page");
        }
        Ok(PostListing {
            page,
            from_cache: false,
        })
    }

    /// One post with tags and comments. Posts that are not visible yet are
    /// reported as missing to everyone but their author.
    pub async fn show(&self, id: i64, viewer_id: Option<i64>) -> Result<PostView, PostServiceError> {
        let key = detail_key(id);
        let cached = self
            .caches
            .details
            .get::<PostView>(&key)
            .await
            .soft(SOURCE, "read_post_detail")
            .flatten();

        let view = match cached {
            Some(view) => view,
            None => {
                let post = self
                    .reader
                    .find_post(id)
                    .await?
                    .ok_or(PostServiceError::NotFound)?;
                let view = self.detail_view(post).await?;
                self.caches
                    .details
                    .set(&key, &view)
                    .await
                    .soft(SOURCE, "write_post_detail");
                view
            }
        };

        if !view.is_visible_at(self.clock.now()) && viewer_id != Some(view.user_id) {
            return Err(PostServiceError::NotFound);
        }
        Ok(view)
    }

    /// Every post of the author in any status, newest first.
    pub async fn my_posts(
        &self,
        author_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<PostView>, PostServiceError> {
        let records = self
            .reader
            .list_by_author(author_id, PageRequest::new(page, per_page))
            .await?;
        self.hydrate_page(records).await
    }

    pub async fn status_report(&self) -> Result<PostStatusReport, PostServiceError> {
        let now = self.clock.now();
        let posts = self
            .reader
            .list_all()
            .await?
            .into_iter()
            .map(|post| PostStatusLine {
                is_published: post.is_visible_at(now),
                is_scheduled: post.is_scheduled(),
                is_draft: post.is_draft(),
                id: post.id,
                title: post.title,
                status: post.status,
                published_at: post.published_at,
            })
            .collect();
        Ok(PostStatusReport { now, posts })
    }

    pub(crate) async fn comment_counts(
        &self,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, PostServiceError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .comments
            .count_for_posts(post_ids)
            .await?
            .into_iter()
            .collect())
    }

    async fn detail_view(&self, post: PostRecord) -> Result<PostView, PostServiceError> {
        let tags = self.tags.list_for_post(post.id).await?;
        let comments = self.comments.list_for_post(post.id).await?;
        let image_url = post
            .image_path
            .as_deref()
            .map(|path| self.images.public_url(path));
        Ok(PostView::from(ViewParts {
            post,
            tags: &tags,
            comments_count: comments.len() as i64,
            comments: Some(comments),
            image_url,
        }))
    }

    async fn hydrate_page(
        &self,
        page: Page<PostRecord>,
    ) -> Result<Page<PostView>, PostServiceError> {
        let ids: Vec<i64> = page.data.iter().map(|post| post.id).collect();
        if ids.is_empty() {
            return Ok(page.map(|post| self.view(post, &[], 0)));
        }

        let mut tags = group_by_post(self.tags.list_for_posts(&ids).await?);
        let counts = self.comment_counts(&ids).await?;
        Ok(page.map(|post| {
            let post_tags = tags.remove(&post.id).unwrap_or_default();
            let count = counts.get(&post.id).copied().unwrap_or(0);
            self.view(post, &post_tags, count)
        }))
    }
}
