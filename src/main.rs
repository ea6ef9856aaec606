use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use quire::{
    application::{
        auth::{AuthError, AuthService},
        clock::{Clock, SystemClock},
        comments::CommentService,
        error::AppError,
        jobs::{
            EmailJobContext, PublishScheduledContext, process_publish_scheduled_job,
            process_send_published_email_job, publish_schedule,
        },
        mail::{MailTransport, MailerConfig},
        notify::{JobNotificationDispatch, NotificationDispatch, PublishNotifier},
        posts::{PostService, PostServiceDeps},
        repos::{CommentsRepo, JobsRepo, PostsRepo, PostsWriteRepo, TagsRepo, UsersRepo},
        scheduler::PublishScheduler,
        search::SearchIndex,
        uploads::ImageStore,
    },
    cache::{CacheConfig, KvStore, MemoryKvStore, ReadCaches},
    config,
    domain::types::JobType,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        kv::{RedisOptions, RedisStore},
        mail::{HttpMailRelay, LogMailTransport},
        telemetry,
        uploads::FilesystemImageStore,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::PublishScheduled(_) => run_publish_scheduled(settings).await,
        config::Command::RebuildSearchIndex(_) => run_rebuild_search_index(settings).await,
        config::Command::CreateUser(args) => run_create_user(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let kv = init_kv_store(&settings.kv).await?;
    let app = build_application_context(http_repositories, kv, &settings)?;

    let monitor_handle = spawn_job_monitor(
        job_repositories,
        app.email_context.clone(),
        app.scheduler.clone(),
        &settings,
    )?;

    let result = serve_http(&settings, app.api_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_publish_scheduled(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, _) = init_repositories(&settings).await?;
    let kv = init_kv_store(&settings.kv).await?;
    let app = build_application_context(http_repositories, kv, &settings)?;

    let report = app.scheduler.run().await?;
    info!(
        target = "quire::publish_scheduled",
        published = report.published.len(),
        failed = report.failed.len(),
        "Publish sweep finished"
    );

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_rebuild_search_index(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, _) = init_repositories(&settings).await?;
    let kv = init_kv_store(&settings.kv).await?;
    let app = build_application_context(http_repositories, kv, &settings)?;

    let report = app.search.rebuild().await;
    println!("indexed posts: {}", report.indexed);
    if let Some(failure) = report.failure {
        return Err(AppError::unexpected(format!(
            "search index rebuild stopped after {} posts: {failure}",
            report.indexed
        )));
    }
    Ok(())
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let (http_repositories, _) = init_repositories(&settings).await?;
    let users_repo: Arc<dyn UsersRepo> = http_repositories;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let auth = AuthService::new(users_repo, clock);

    let issued = auth
        .create_user(&args.name, &args.email)
        .await
        .map_err(|err| match err {
            AuthError::Repo(repo) => AppError::from(repo),
            other => AppError::validation(other.to_string()),
        })?;

    info!(
        target = "quire::create_user",
        user_id = issued.user.id,
        "Author created"
    );
    println!("user id: {}", issued.user.id);
    println!("token:   {}", issued.token);
    println!("The token is shown only once; store it now.");
    Ok(())
}

struct ApplicationContext {
    api_state: ApiState,
    scheduler: Arc<PublishScheduler>,
    search: SearchIndex,
    email_context: EmailJobContext,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

async fn init_kv_store(settings: &config::KvSettings) -> Result<Arc<dyn KvStore>, AppError> {
    let Some(url) = settings.redis_url.as_ref() else {
        warn!(
            target = "quire::kv",
            capacity = settings.memory_capacity.get(),
            "No redis url configured; caches and search index live in process memory"
        );
        return Ok(Arc::new(MemoryKvStore::new(settings.memory_capacity)));
    };

    let options = RedisOptions {
        url: url.clone(),
        connection_timeout: settings.connection_timeout,
        response_timeout: settings.response_timeout,
        retries: settings.retries as usize,
    };
    let store = RedisStore::connect(&options)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    store
        .ping()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "quire::kv", "Connected to redis");
    Ok(Arc::new(store))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    kv: Arc<dyn KvStore>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = repositories;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let caches = ReadCaches::new(kv.clone(), &CacheConfig::from(&settings.cache));
    let search = SearchIndex::new(
        kv,
        posts_repo.clone(),
        tags_repo.clone(),
        clock.clone(),
        settings.search.rebuild_batch_size,
    );

    let dispatch: Arc<dyn NotificationDispatch> = Arc::new(JobNotificationDispatch::new(jobs_repo));
    let notifier = PublishNotifier::new(users_repo.clone(), dispatch);

    let images: Arc<dyn ImageStore> = Arc::new(
        FilesystemImageStore::new(
            settings.uploads.directory.clone(),
            &settings.uploads.public_base_url,
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let posts = Arc::new(PostService::new(
        PostServiceDeps {
            reader: posts_repo.clone(),
            writer: posts_write_repo.clone(),
            tags: tags_repo,
            comments: comments_repo.clone(),
            search: search.clone(),
            notifier: notifier.clone(),
            caches: caches.clone(),
            images: images.clone(),
            clock: clock.clone(),
        },
        settings.cache.per_page.get(),
    ));
    let comments = Arc::new(CommentService::new(
        posts_repo.clone(),
        comments_repo,
        caches.clone(),
        clock.clone(),
    ));
    let auth = Arc::new(AuthService::new(users_repo, clock.clone()));
    let scheduler = Arc::new(PublishScheduler::new(
        posts_repo,
        posts_write_repo,
        search.clone(),
        notifier.clone(),
        caches,
        clock.clone(),
    ));

    let transport: Arc<dyn MailTransport> = match settings.mail.relay_url.as_ref() {
        Some(url) => Arc::new(HttpMailRelay::new(url.clone()).map_err(AppError::from)?),
        None => Arc::new(LogMailTransport),
    };
    let email_context = EmailJobContext {
        transport,
        mailer: MailerConfig {
            from_address: settings.mail.from_address.clone(),
            app_name: settings.mail.app_name.clone(),
            frontend_url: settings.server.frontend_url.clone(),
        },
    };

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

    let api_state = ApiState {
        posts,
        comments,
        auth,
        scheduler: scheduler.clone(),
        notifier,
        images,
        clock,
        environment: settings.server.environment,
        upload_limit_bytes,
    };

    Ok(ApplicationContext {
        api_state,
        scheduler,
        search,
        email_context,
    })
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    email_context: EmailJobContext,
    scheduler: Arc<PublishScheduler>,
    settings: &config::Settings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let email_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::SendPublishedEmail.as_str()),
    );

    let email_worker = WorkerBuilder::new("send-published-email-worker")
        .concurrency(settings.jobs.email_concurrency.get() as usize)
        .data(email_context)
        .backend(email_storage)
        .build_fn(process_send_published_email_job);

    let mut monitor = Monitor::new().register(email_worker);

    if settings.scheduler.enabled {
        let schedule = publish_schedule(&settings.scheduler.cron)
            .map_err(|reason| AppError::validation(format!("scheduler.cron: {reason}")))?;
        let publish_worker = WorkerBuilder::new("publish-scheduled-worker")
            .data(PublishScheduledContext { scheduler })
            .backend(CronStream::new(schedule))
            .build_fn(process_publish_scheduled_job);
        monitor = monitor.register(publish_worker);
    } else {
        info!(
            target = "quire::jobs",
            "Publish sweep disabled; run `quire publish-scheduled` externally"
        );
    }

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, api_state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "quire::http",
        addr = %settings.server.addr,
        environment = ?settings.server.environment,
        "Listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(target = "quire::http", "Shutdown requested; draining connections");
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "quire::http",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
