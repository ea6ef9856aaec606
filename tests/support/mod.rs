//! In-memory collaborators shared by the integration tests.
//!
//! `MemoryRepos` implements every repository trait over one locked state so
//! cross-table effects (cascading deletes, comment author names) behave like
//! the Postgres adapters. Services are wired exactly as `main` wires them,
//! with a [`ManualClock`] in place of the system clock. The key-value store,
//! notification dispatch and tag writes sit behind switches in [`Faults`] so
//! tests can simulate outages.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::Router;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;

use quire::application::auth::AuthService;
use quire::application::clock::{Clock, ManualClock};
use quire::application::comments::CommentService;
use quire::application::notify::{
    JobNotificationDispatch, NotificationDispatch, NotifyError, PublishNotifier,
    PublishedPostNotice,
};
use quire::application::pagination::{Page, PageRequest};
use quire::application::posts::{PostService, PostServiceDeps};
use quire::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, CreateUserParams, JobsRepo, NewJobRecord,
    PostsRepo, PostsWriteRepo, RepoError, SavedPost, TagsRepo, UpdatePostParams, UsersRepo,
};
use quire::application::scheduler::PublishScheduler;
use quire::application::search::SearchIndex;
use quire::application::uploads::{IMAGE_DIRECTORY, ImageStore, ImageStoreError, StoredImage};
use quire::cache::{CacheConfig, KvError, KvStore, MemoryKvStore, ReadCaches};
use quire::config::DeploymentEnvironment;
use quire::domain::entities::{CommentRecord, PostRecord, TagRecord, UserRecord};
use quire::domain::types::PostStatus;
use quire::infra::http::{ApiState, build_router};

pub const START: OffsetDateTime = datetime!(2025-01-01 12:00 UTC);
pub const INDEX_PER_PAGE: u32 = 10;
pub const UPLOAD_LIMIT_BYTES: usize = 64 * 1024;

/// Outage switches shared by the fakes of one [`Harness`].
#[derive(Default)]
pub struct Faults {
    kv_down: AtomicBool,
    dispatch_down: AtomicBool,
    tag_writes_down: AtomicBool,
    hash_write_budget: std::sync::Mutex<Option<usize>>,
}

impl Faults {
    /// Every key-value operation fails while set.
    pub fn kv_outage(&self, down: bool) {
        self.kv_down.store(down, Ordering::SeqCst);
    }

    pub fn dispatch_outage(&self, down: bool) {
        self.dispatch_down.store(down, Ordering::SeqCst);
    }

    /// Post writes that attach tags fail while set.
    pub fn tag_write_failure(&self, down: bool) {
        self.tag_writes_down.store(down, Ordering::SeqCst);
    }

    /// Allow `writes` more hash writes, then fail every later one.
    pub fn fail_hash_writes_after(&self, writes: usize) {
        *self.hash_write_budget.lock().expect("budget lock") = Some(writes);
    }

    fn check_kv(&self) -> Result<(), KvError> {
        if self.kv_down.load(Ordering::SeqCst) {
            return Err(KvError::backend("connection refused"));
        }
        Ok(())
    }

    fn take_hash_write(&self) -> Result<(), KvError> {
        let mut budget = self.hash_write_budget.lock().expect("budget lock");
        match budget.as_mut() {
            Some(0) => Err(KvError::backend("connection reset")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_tag_write(&self) -> Result<(), RepoError> {
        if self.tag_writes_down.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("tag write rejected"));
        }
        Ok(())
    }
}

/// [`MemoryKvStore`] behind the [`Faults`] switches.
pub struct FaultyKvStore {
    inner: Arc<MemoryKvStore>,
    faults: Arc<Faults>,
}

#[async_trait]
impl KvStore for FaultyKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.faults.check_kv()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<StdDuration>) -> Result<(), KvError> {
        self.faults.check_kv()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        self.faults.check_kv()?;
        self.inner.delete(keys).await
    }

    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<(), KvError> {
        self.faults.check_kv()?;
        self.faults.take_hash_write()?;
        self.inner.hash_replace(key, fields).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, KvError> {
        self.faults.check_kv()?;
        self.inner.hash_get_all(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        self.faults.check_kv()?;
        self.inner.scan_prefix(prefix).await
    }
}

/// Job-queue dispatch that refuses notices during a dispatch outage.
pub struct FaultyDispatch {
    inner: JobNotificationDispatch,
    faults: Arc<Faults>,
}

#[async_trait]
impl NotificationDispatch for FaultyDispatch {
    async fn enqueue(&self, notice: PublishedPostNotice) -> Result<(), NotifyError> {
        if self.faults.dispatch_down.load(Ordering::SeqCst) {
            return Err(NotifyError::Enqueue(RepoError::Timeout));
        }
        self.inner.enqueue(notice).await
    }
}

#[derive(Default)]
struct State {
    posts: BTreeMap<i64, PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: HashMap<i64, Vec<i64>>,
    comments: BTreeMap<i64, CommentRecord>,
    users: BTreeMap<i64, (UserRecord, String)>,
    jobs: Vec<NewJobRecord>,
    next_post: i64,
    next_tag: i64,
    next_comment: i64,
    next_user: i64,
}

pub struct MemoryRepos {
    state: Mutex<State>,
    faults: Arc<Faults>,
}

impl MemoryRepos {
    pub fn new(faults: Arc<Faults>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            faults,
        }
    }

    pub async fn jobs(&self) -> Vec<NewJobRecord> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.state.lock().await.posts.get(&id).cloned()
    }

    /// Overwrite a stored post, bypassing the services.
    pub async fn put_post(&self, post: PostRecord) {
        self.state.lock().await.posts.insert(post.id, post);
    }
}

fn paginate(posts: Vec<PostRecord>, page: PageRequest) -> Page<PostRecord> {
    let total = posts.len() as u64;
    Page::new(page.slice(&posts).to_vec(), page, total)
}

fn newest_created_first(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.lock().await.posts.get(&id).cloned())
    }

    async fn list_published(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<_> = state
            .posts
            .values()
            .filter(|post| post.is_visible_at(now))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        Ok(paginate(posts, page))
    }

    async fn list_recent(
        &self,
        now: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<_> = state
            .posts
            .values()
            .filter(|post| post.is_visible_at(now))
            .cloned()
            .collect();
        newest_created_first(&mut posts);
        Ok(paginate(posts, page))
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<_> = state
            .posts
            .values()
            .filter(|post| post.author_id == author_id)
            .cloned()
            .collect();
        newest_created_first(&mut posts);
        Ok(paginate(posts, page))
    }

    async fn list_visible_by_ids(
        &self,
        ids: &[i64],
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<_> = ids
            .iter()
            .filter_map(|id| state.posts.get(id))
            .filter(|post| post.is_visible_at(now))
            .cloned()
            .collect();
        newest_created_first(&mut posts);
        Ok(posts)
    }

    async fn list_visible_after(
        &self,
        after: Option<i64>,
        limit: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .values()
            .filter(|post| after.is_none_or(|after| post.id > after))
            .filter(|post| post.is_visible_at(now))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_due(&self, now: OffsetDateTime) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut due: Vec<_> = state
            .posts
            .values()
            .filter(|post| post.status == PostStatus::Scheduled)
            .filter(|post| post.published_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.published_at.cmp(&b.published_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn list_all(&self) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.state.lock().await.posts.values().cloned().collect())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<SavedPost, RepoError> {
        if !params.tags.is_empty() {
            self.faults.check_tag_write()?;
        }
        let mut state = self.state.lock().await;
        state.next_post += 1;
        let post = PostRecord {
            id: state.next_post,
            author_id: params.author_id,
            title: params.fields.title,
            excerpt: params.fields.excerpt,
            description: params.fields.description,
            image_path: params.fields.image_path,
            meta_title: params.fields.meta_title,
            meta_description: params.fields.meta_description,
            status: params.status,
            published_at: params.published_at,
            created_at: params.now,
            updated_at: params.now,
        };
        state.posts.insert(post.id, post.clone());
        let tags = attach_tags(&mut state, post.id, &params.tags);
        Ok(SavedPost { post, tags })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<SavedPost, RepoError> {
        if params.tags.is_some() {
            self.faults.check_tag_write()?;
        }
        let mut state = self.state.lock().await;
        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.title = params.fields.title;
        post.excerpt = params.fields.excerpt;
        post.description = params.fields.description;
        post.image_path = params.fields.image_path;
        post.meta_title = params.fields.meta_title;
        post.meta_description = params.fields.meta_description;
        post.status = params.status;
        post.published_at = params.published_at;
        post.updated_at = params.now;
        let post = post.clone();
        let tags = match params.tags {
            Some(names) => attach_tags(&mut state, post.id, &names),
            None => tags_of(&state, post.id),
        };
        Ok(SavedPost { post, tags })
    }

    async fn mark_published(
        &self,
        id: i64,
        published_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.status = PostStatus::Published;
        post.published_at = Some(published_at);
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.posts.remove(&id).ok_or(RepoError::NotFound)?;
        state.post_tags.remove(&id);
        state.comments.retain(|_, comment| comment.post_id != id);
        Ok(())
    }
}

fn tags_of(state: &State, post_id: i64) -> Vec<TagRecord> {
    let ids = state.post_tags.get(&post_id).cloned().unwrap_or_default();
    let mut tags: Vec<_> = state
        .tags
        .iter()
        .filter(|tag| ids.contains(&tag.id))
        .cloned()
        .collect();
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    tags
}

/// Get-or-create `names` and make them the post's exact tag set.
fn attach_tags(state: &mut State, post_id: i64, names: &[String]) -> Vec<TagRecord> {
    let mut attached = Vec::with_capacity(names.len());
    for name in names {
        if let Some(tag) = state.tags.iter().find(|tag| &tag.name == name) {
            attached.push(tag.clone());
            continue;
        }
        state.next_tag += 1;
        let tag = TagRecord {
            id: state.next_tag,
            name: name.clone(),
        };
        state.tags.push(tag.clone());
        attached.push(tag);
    }
    state
        .post_tags
        .insert(post_id, attached.iter().map(|tag| tag.id).collect());
    attached
}

#[async_trait]
impl TagsRepo for MemoryRepos {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(tags_of(&state, post_id))
    }

    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, TagRecord)>, RepoError> {
        let state = self.state.lock().await;
        Ok(post_ids
            .iter()
            .flat_map(|id| tags_of(&state, *id).into_iter().map(move |tag| (*id, tag)))
            .collect())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author_name = state
            .users
            .get(&params.author_id)
            .map(|(user, _)| user.name.clone())
            .ok_or_else(|| RepoError::Integrity {
                message: format!("user {} does not exist", params.author_id),
            })?;
        state.next_comment += 1;
        let comment = CommentRecord {
            id: state.next_comment,
            post_id: params.post_id,
            author_id: params.author_id,
            author_name,
            content: params.content,
            created_at: params.now,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.lock().await.comments.get(&id).cloned())
    }

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn count_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, i64)>, RepoError> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
        for comment in state.comments.values() {
            if post_ids.contains(&comment.post_id) {
                *counts.entry(comment.post_id).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .get(&id)
            .map(|(user, _)| user.clone()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|(_, hash)| hash == token_hash)
            .map(|(user, _)| user.clone()))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(user, _)| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }
        state.next_user += 1;
        let user = UserRecord {
            id: state.next_user,
            name: params.name,
            email: params.email,
        };
        state
            .users
            .insert(user.id, (user.clone(), params.token_hash));
        Ok(user)
    }
}

#[async_trait]
impl JobsRepo for MemoryRepos {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut state = self.state.lock().await;
        state.jobs.push(job);
        Ok(state.jobs.len().to_string())
    }
}

/// Image store keeping payloads in memory.
#[derive(Default)]
pub struct MemoryImageStore {
    files: Mutex<BTreeMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryImageStore {
    pub async fn contains(&self, path: &str) -> bool {
        self.files.lock().await.contains_key(path)
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn store_stream<'a>(
        &self,
        original_name: &str,
        mut stream: BoxStream<'a, Result<Bytes, ImageStoreError>>,
    ) -> Result<StoredImage, ImageStoreError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        if buffer.is_empty() {
            return Err(ImageStoreError::EmptyPayload);
        }

        let mut files = self.files.lock().await;
        let path = format!("{IMAGE_DIRECTORY}/{}-{original_name}", files.len() + 1);
        let size_bytes = buffer.len() as u64;
        files.insert(path.clone(), buffer.freeze());
        Ok(StoredImage {
            path,
            checksum: String::new(),
            size_bytes,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), ImageStoreError> {
        self.files.lock().await.remove(path);
        self.deleted.lock().await.push(path.to_string());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("http://localhost:3000/storage/{path}")
    }
}

pub struct Author {
    pub user: UserRecord,
    pub token: String,
}

impl Author {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Every service wired over in-memory state.
pub struct Harness {
    pub repos: Arc<MemoryRepos>,
    /// The store behind the services, readable even during a simulated outage.
    pub kv: Arc<MemoryKvStore>,
    pub faults: Arc<Faults>,
    pub clock: Arc<ManualClock>,
    pub images: Arc<MemoryImageStore>,
    pub caches: ReadCaches,
    pub search: SearchIndex,
    pub notifier: PublishNotifier,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub auth: Arc<AuthService>,
    pub scheduler: Arc<PublishScheduler>,
}

impl Harness {
    pub fn new() -> Self {
        let faults = Arc::new(Faults::default());
        let repos = Arc::new(MemoryRepos::new(faults.clone()));
        let kv = Arc::new(MemoryKvStore::new(
            NonZeroUsize::new(10_000).expect("non-zero capacity"),
        ));
        let clock = Arc::new(ManualClock::new(START));
        let images = Arc::new(MemoryImageStore::default());

        let store: Arc<dyn KvStore> = Arc::new(FaultyKvStore {
            inner: kv.clone(),
            faults: faults.clone(),
        });
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let posts_repo: Arc<dyn PostsRepo> = repos.clone();
        let writer: Arc<dyn PostsWriteRepo> = repos.clone();
        let tags_repo: Arc<dyn TagsRepo> = repos.clone();
        let comments_repo: Arc<dyn CommentsRepo> = repos.clone();
        let users_repo: Arc<dyn UsersRepo> = repos.clone();
        let jobs_repo: Arc<dyn JobsRepo> = repos.clone();
        let image_store: Arc<dyn ImageStore> = images.clone();

        let caches = ReadCaches::new(store.clone(), &CacheConfig::default());
        let search = SearchIndex::new(
            store,
            posts_repo.clone(),
            tags_repo.clone(),
            clock_dyn.clone(),
            NonZeroU32::new(2).expect("non-zero batch"),
        );
        let dispatch: Arc<dyn NotificationDispatch> = Arc::new(FaultyDispatch {
            inner: JobNotificationDispatch::new(jobs_repo),
            faults: faults.clone(),
        });
        let notifier = PublishNotifier::new(users_repo.clone(), dispatch);

        let posts = Arc::new(PostService::new(
            PostServiceDeps {
                reader: posts_repo.clone(),
                writer: writer.clone(),
                tags: tags_repo,
                comments: comments_repo.clone(),
                search: search.clone(),
                notifier: notifier.clone(),
                caches: caches.clone(),
                images: image_store,
                clock: clock_dyn.clone(),
            },
            INDEX_PER_PAGE,
        ));
        let comments = Arc::new(CommentService::new(
            posts_repo.clone(),
            comments_repo,
            caches.clone(),
            clock_dyn.clone(),
        ));
        let auth = Arc::new(AuthService::new(users_repo, clock_dyn.clone()));
        let scheduler = Arc::new(PublishScheduler::new(
            posts_repo,
            writer,
            search.clone(),
            notifier.clone(),
            caches.clone(),
            clock_dyn,
        ));

        Self {
            repos,
            kv,
            faults,
            clock,
            images,
            caches,
            search,
            notifier,
            posts,
            comments,
            auth,
            scheduler,
        }
    }

    pub fn api_state(&self, environment: DeploymentEnvironment) -> ApiState {
        ApiState {
            posts: self.posts.clone(),
            comments: self.comments.clone(),
            auth: self.auth.clone(),
            scheduler: self.scheduler.clone(),
            notifier: self.notifier.clone(),
            images: self.images.clone(),
            clock: self.clock.clone(),
            environment,
            upload_limit_bytes: UPLOAD_LIMIT_BYTES,
        }
    }

    pub fn router(&self, environment: DeploymentEnvironment) -> Router {
        build_router(self.api_state(environment))
    }

    pub async fn author(&self, name: &str) -> Author {
        let email = format!("{}@example.com", name.to_lowercase());
        let issued = self.auth.create_user(name, &email).await.expect("create user");
        Author {
            user: issued.user,
            token: issued.token,
        }
    }

    pub async fn notifications(&self) -> Vec<NewJobRecord> {
        self.repos.jobs().await
    }

    pub fn advance(&self, by: time::Duration) {
        self.clock.advance(by);
    }
}
