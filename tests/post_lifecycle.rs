//! Post create/update/delete semantics against in-memory storage.

mod support;

use time::{Duration, OffsetDateTime};

use quire::application::pagination::PageRequest;
use quire::application::posts::{CreatePostCommand, PostServiceError, UpdatePostCommand};
use quire::cache::{KvStore, search_key};
use quire::domain::posts::PublishAtChange;
use quire::domain::types::{JobType, PostStatus};

use support::{Harness, START};

fn create(author_id: i64, title: &str, publish_at: Option<OffsetDateTime>) -> CreatePostCommand {
    CreatePostCommand {
        author_id,
        title: title.to_string(),
        excerpt: format!("{title} excerpt"),
        description: format!("{title} body"),
        image_path: None,
        meta_title: None,
        meta_description: None,
        tags: Vec::new(),
        publish_at,
        draft: false,
    }
}

fn update(id: i64, actor_id: i64) -> UpdatePostCommand {
    UpdatePostCommand {
        id,
        actor_id,
        title: None,
        excerpt: None,
        description: None,
        image_path: None,
        meta_title: None,
        meta_description: None,
        tags: None,
        publish_at: PublishAtChange::Keep,
        draft: false,
    }
}

async fn has_search_entry(harness: &Harness, post_id: i64) -> bool {
    !harness
        .kv
        .hash_get_all(&search_key(post_id))
        .await
        .expect("hash read")
        .is_empty()
}

#[tokio::test]
async fn create_without_publish_time_publishes_silently() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;

    let view = harness
        .posts
        .create_post(create(author.user.id, "Hello", None))
        .await
        .expect("create");

    assert_eq!(view.status, PostStatus::Published);
    assert_eq!(view.published_at, Some(START));
    assert!(has_search_entry(&harness, view.id).await);
    assert!(harness.notifications().await.is_empty());
}

#[tokio::test]
async fn create_with_future_publish_time_schedules_without_index_entry() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let at = START + Duration::hours(3);

    let view = harness
        .posts
        .create_post(create(author.user.id, "Later", Some(at)))
        .await
        .expect("create");

    assert_eq!(view.status, PostStatus::Scheduled);
    assert_eq!(view.published_at, Some(at));
    assert!(!has_search_entry(&harness, view.id).await);
    assert!(harness.notifications().await.is_empty());
}

#[tokio::test]
async fn create_with_past_publish_time_notifies_author_once() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;

    let view = harness
        .posts
        .create_post(create(
            author.user.id,
            "Backdated",
            Some(START - Duration::days(2)),
        ))
        .await
        .expect("create");

    assert_eq!(view.status, PostStatus::Published);
    let jobs = harness.notifications().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, JobType::SendPublishedEmail);
    assert_eq!(jobs[0].payload["post_id"], view.id);
    assert_eq!(jobs[0].payload["recipient_email"], "ada@example.com");
}

#[tokio::test]
async fn draft_posts_stay_out_of_the_index() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let mut command = create(author.user.id, "Draft", None);
    command.draft = true;

    let view = harness.posts.create_post(command).await.expect("create");

    assert_eq!(view.status, PostStatus::Draft);
    assert_eq!(view.published_at, None);
    assert!(!has_search_entry(&harness, view.id).await);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;

    let err = harness
        .posts
        .create_post(create(author.user.id, "   ", None))
        .await
        .expect_err("blank title");

    assert!(matches!(err, PostServiceError::Validation(_)));
}

#[tokio::test]
async fn tags_are_normalized_and_deduplicated() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let mut command = create(author.user.id, "Tagged", None);
    command.tags = vec![" Rust ".into(), "rust".into(), "".into(), "Async".into()];

    let view = harness.posts.create_post(command).await.expect("create");

    let mut tags = view.tags.clone();
    tags.sort();
    assert_eq!(tags, vec!["async".to_string(), "rust".to_string()]);
}

#[tokio::test]
async fn republishing_an_already_published_post_does_not_notify() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(author.user.id, "Hello", None))
        .await
        .expect("create");

    let mut command = update(view.id, author.user.id);
    command.publish_at = PublishAtChange::At(START - Duration::days(7));
    let updated = harness.posts.update_post(command).await.expect("update");

    assert_eq!(updated.status, PostStatus::Published);
    assert_eq!(updated.published_at, Some(START - Duration::days(7)));
    assert!(harness.notifications().await.is_empty());
}

#[tokio::test]
async fn moving_a_scheduled_post_into_the_past_publishes_and_notifies() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(
            author.user.id,
            "Later",
            Some(START + Duration::days(1)),
        ))
        .await
        .expect("create");

    let mut command = update(view.id, author.user.id);
    command.publish_at = PublishAtChange::At(START - Duration::minutes(1));
    let updated = harness.posts.update_post(command).await.expect("update");

    assert_eq!(updated.status, PostStatus::Published);
    assert!(has_search_entry(&harness, view.id).await);
    assert_eq!(harness.notifications().await.len(), 1);
}

#[tokio::test]
async fn clearing_publish_time_publishes_immediately() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(
            author.user.id,
            "Later",
            Some(START + Duration::days(1)),
        ))
        .await
        .expect("create");

    let mut command = update(view.id, author.user.id);
    command.publish_at = PublishAtChange::Now;
    let updated = harness.posts.update_post(command).await.expect("update");

    assert_eq!(updated.status, PostStatus::Published);
    assert_eq!(updated.published_at, Some(START));
}

#[tokio::test]
async fn published_posts_cannot_return_to_draft() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(author.user.id, "Hello", None))
        .await
        .expect("create");

    let mut command = update(view.id, author.user.id);
    command.draft = true;
    let err = harness
        .posts
        .update_post(command)
        .await
        .expect_err("draft");

    assert!(matches!(err, PostServiceError::Validation(_)));
}

#[tokio::test]
async fn only_the_author_may_modify_a_post() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let other = harness.author("Grace").await;
    let view = harness
        .posts
        .create_post(create(author.user.id, "Mine", None))
        .await
        .expect("create");

    let err = harness
        .posts
        .update_post(update(view.id, other.user.id))
        .await
        .expect_err("forbidden update");
    assert!(matches!(err, PostServiceError::Forbidden));

    let err = harness
        .posts
        .delete_post(view.id, other.user.id)
        .await
        .expect_err("forbidden delete");
    assert!(matches!(err, PostServiceError::Forbidden));

    let err = harness
        .posts
        .delete_post(9_999, author.user.id)
        .await
        .expect_err("missing");
    assert!(matches!(err, PostServiceError::NotFound));
}

#[tokio::test]
async fn omitted_fields_keep_stored_values() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(author.user.id, "Original", None))
        .await
        .expect("create");

    let mut command = update(view.id, author.user.id);
    command.title = Some("Renamed".into());
    let updated = harness.posts.update_post(command).await.expect("update");

    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.description, "Original body");
    assert_eq!(updated.published_at, view.published_at);
}

#[tokio::test]
async fn replacing_the_image_deletes_the_old_file() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let mut command = create(author.user.id, "Pictured", None);
    command.image_path = Some("blog_images/old.png".into());
    let view = harness.posts.create_post(command).await.expect("create");
    assert_eq!(
        view.image_url.as_deref(),
        Some("http://localhost:3000/storage/blog_images/old.png")
    );

    let mut command = update(view.id, author.user.id);
    command.image_path = Some("blog_images/new.png".into());
    harness.posts.update_post(command).await.expect("update");

    assert_eq!(
        harness.images.deleted().await,
        vec!["blog_images/old.png".to_string()]
    );
}

#[tokio::test]
async fn delete_removes_index_entry_and_detail_cache_for_good() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let view = harness
        .posts
        .create_post(create(author.user.id, "Doomed", None))
        .await
        .expect("create");

    harness.posts.show(view.id, None).await.expect("warm detail");
    let detail_key = format!("blog_post.{}", view.id);
    assert!(harness.kv.get(&detail_key).await.expect("get").is_some());

    harness
        .posts
        .delete_post(view.id, author.user.id)
        .await
        .expect("delete");

    assert!(!has_search_entry(&harness, view.id).await);
    assert!(harness.kv.get(&detail_key).await.expect("get").is_none());

    let report = harness.search.rebuild().await;
    assert_eq!(report.failure, None);
    assert!(!has_search_entry(&harness, view.id).await);

    let found = harness
        .search
        .search("doomed", PageRequest::default())
        .await
        .expect("search");
    assert!(found.data.is_empty());
}

#[tokio::test]
async fn unpublished_posts_are_hidden_from_everyone_but_their_author() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let other = harness.author("Grace").await;
    let view = harness
        .posts
        .create_post(create(
            author.user.id,
            "Later",
            Some(START + Duration::hours(1)),
        ))
        .await
        .expect("create");

    assert!(matches!(
        harness.posts.show(view.id, None).await,
        Err(PostServiceError::NotFound)
    ));
    assert!(matches!(
        harness.posts.show(view.id, Some(other.user.id)).await,
        Err(PostServiceError::NotFound)
    ));
    let own = harness
        .posts
        .show(view.id, Some(author.user.id))
        .await
        .expect("author sees own post");
    assert_eq!(own.status, PostStatus::Scheduled);
}

#[tokio::test]
async fn my_posts_lists_every_status() {
    let harness = Harness::new();
    let author = harness.author("Ada").await;
    let other = harness.author("Grace").await;

    harness
        .posts
        .create_post(create(author.user.id, "Now", None))
        .await
        .expect("create");
    harness.advance(Duration::minutes(1));
    harness
        .posts
        .create_post(create(
            author.user.id,
            "Later",
            Some(START + Duration::days(1)),
        ))
        .await
        .expect("create");
    harness
        .posts
        .create_post(create(other.user.id, "Theirs", None))
        .await
        .expect("create");

    let page = harness
        .posts
        .my_posts(author.user.id, 1, 10)
        .await
        .expect("my posts");

    let titles: Vec<_> = page.data.iter().map(|post| post.title.as_str()).collect();
    assert_eq!(titles, vec!["Later", "Now"]);
    assert_eq!(page.meta.total, 2);
}
