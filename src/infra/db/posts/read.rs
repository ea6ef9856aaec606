use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

use super::types::{POST_COLUMNS, PostRow};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

/// Row filter of a paginated listing.
#[derive(Clone, Copy)]
enum Listing {
    Visible { now: OffsetDateTime },
    Author { author_id: i64 },
}

impl Listing {
    fn push_conditions(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Listing::Visible { now } => push_visible(qb, now),
            Listing::Author { author_id } => {
                qb.push(" AND p.user_id = ");
                qb.push_bind(author_id);
            }
        }
    }
}

fn push_visible(qb: &mut QueryBuilder<'_, Postgres>, now: OffsetDateTime) {
    qb.push(" AND p.status = ");
    qb.push_bind(PostStatus::Published);
    qb.push(" AND p.published_at IS NOT NULL AND p.published_at <= ");
    qb.push_bind(now);
}

impl PostgresRepositories {
    async fn fetch_page(
        &self,
        listing: Listing,
        order_by: &'static str,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM blog_posts p WHERE 1=1 ");
        listing.push_conditions(&mut count_qb);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM blog_posts p WHERE 1=1 ");
        listing.push_conditions(&mut qb);
        qb.push(" ORDER BY ");
        qb.push(order_by);
        qb.push(" LIMIT ");
        qb.push_bind(page.limit() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total = u64::try_from(total)
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))?;
        Ok(Page::new(
            rows.into_iter().map(PostRecord::from).collect(),
            page,
            total,
        ))
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM blog_posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_published(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        self.fetch_page(
            Listing::Visible { now },
            "p.published_at DESC, p.id DESC",
            page,
        )
        .await
    }

    async fn list_recent(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        self.fetch_page(Listing::Visible { now }, "p.created_at DESC, p.id DESC", page)
            .await
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        self.fetch_page(
            Listing::Author { author_id },
            "p.created_at DESC, p.id DESC",
            page,
        )
        .await
    }

    async fn list_visible_by_ids(
        &self,
        ids: &[i64],
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM blog_posts p WHERE p.id = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(")");
        push_visible(&mut qb, now);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC");

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_visible_after(
        &self,
        after: Option<i64>,
        limit: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM blog_posts p WHERE 1=1 ");
        push_visible(&mut qb, now);
        if let Some(after) = after {
            qb.push(" AND p.id > ");
            qb.push_bind(after);
        }
        qb.push(" ORDER BY p.id ASC LIMIT ");
        qb.push_bind(i64::from(limit.max(1)));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_due(&self, now: OffsetDateTime) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts p \
             WHERE p.status = $1 AND p.published_at IS NOT NULL AND p.published_at <= $2 \
             ORDER BY p.published_at ASC, p.id ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(PostStatus::Scheduled)
            .bind(now)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM blog_posts p ORDER BY p.id ASC");
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}
