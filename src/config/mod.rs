//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_KV_CONNECTION_TIMEOUT_MS: u64 = 500;
const DEFAULT_KV_RESPONSE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_KV_RETRIES: u32 = 2;
const DEFAULT_KV_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_LIST_TTL_SECS: u64 = 600;
const DEFAULT_PAGE_TTL_SECS: u64 = 60;
const DEFAULT_DETAIL_TTL_SECS: u64 = 60;
const DEFAULT_INDEX_PER_PAGE: u64 = 10;
const DEFAULT_REBUILD_BATCH_SIZE: u64 = 500;
const DEFAULT_UPLOAD_DIR: &str = "storage/public";
const DEFAULT_UPLOAD_PUBLIC_BASE_URL: &str = "http://localhost:3000/storage";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_MAIL_FROM_ADDRESS: &str = "no-reply@quire.local";
const DEFAULT_MAIL_APP_NAME: &str = "Quire";
const DEFAULT_SCHEDULER_CRON: &str = "0 * * * * *";
const DEFAULT_JOB_EMAIL_CONCURRENCY: u32 = 2;

/// Command-line arguments for the Quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Quire blog publishing service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUIRE_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and background workers.
    Serve(Box<ServeArgs>),
    /// Publish every scheduled post that is due, once.
    #[command(name = "publish-scheduled")]
    PublishScheduled(DatabaseOverride),
    /// Drop and rebuild the post search index.
    #[command(name = "rebuild-search-index")]
    RebuildSearchIndex(StorageOverrides),
    /// Create an author and print their bearer token.
    #[command(name = "create-user")]
    CreateUser(CreateUserArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateUserArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Display name of the author.
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// Email address notifications are sent to.
    #[arg(long, value_name = "EMAIL")]
    pub email: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Override the log level (error, warn, info, debug, trace).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub kv: KvSettings,
    pub cache: CacheSettings,
    pub search: SearchSettings,
    pub uploads: UploadSettings,
    pub mail: MailSettings,
    pub scheduler: SchedulerSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub environment: DeploymentEnvironment,
    pub frontend_url: String,
}

/// Where the service runs; gates the operational endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    Local,
    Testing,
    Production,
}

impl DeploymentEnvironment {
    pub fn allows_operational_endpoints(self) -> bool {
        matches!(self, Self::Local | Self::Testing)
    }
}

impl FromStr for DeploymentEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment `{other}`; expected local, testing or production"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub redis_url: Option<String>,
    pub connection_timeout: Duration,
    pub response_timeout: Duration,
    pub retries: u32,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub list_ttl: Duration,
    pub page_ttl: Duration,
    pub detail_ttl: Duration,
    pub per_page: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub rebuild_batch_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub public_base_url: String,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_url: Option<String>,
    pub from_address: String,
    pub app_name: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cron: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub email_concurrency: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUIRE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::PublishScheduled(database)) => raw.apply_database_override(database),
        Some(Command::RebuildSearchIndex(storage)) => raw.apply_storage_overrides(storage),
        Some(Command::CreateUser(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    kv: RawKvSettings,
    cache: RawCacheSettings,
    search: RawSearchSettings,
    uploads: RawUploadSettings,
    mail: RawMailSettings,
    scheduler: RawSchedulerSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        self.apply_database_override(&overrides.database);
        if let Some(url) = overrides.redis_url.as_ref() {
            self.kv.redis_url = Some(url.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            kv,
            cache,
            search,
            uploads,
            mail,
            scheduler,
            jobs,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            kv: build_kv_settings(kv)?,
            cache: build_cache_settings(cache)?,
            search: build_search_settings(search)?,
            uploads: build_upload_settings(uploads)?,
            mail: build_mail_settings(mail)?,
            scheduler: build_scheduler_settings(scheduler)?,
            jobs: build_jobs_settings(jobs)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let environment = match server.environment {
        Some(value) => DeploymentEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("server.environment", reason))?,
        None => DeploymentEnvironment::Production,
    };

    let frontend_url = non_blank(server.frontend_url)
        .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
    let frontend_url = parse_base_url(&frontend_url, "server.frontend_url")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        environment,
        frontend_url,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        http_max_connections: non_zero_u32(http_value.into(), "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?,
    })
}

fn build_kv_settings(kv: RawKvSettings) -> Result<KvSettings, LoadError> {
    let connection_ms = kv
        .connection_timeout_ms
        .unwrap_or(DEFAULT_KV_CONNECTION_TIMEOUT_MS);
    if connection_ms == 0 {
        return Err(LoadError::invalid(
            "kv.connection_timeout_ms",
            "must be greater than zero",
        ));
    }

    let response_ms = kv
        .response_timeout_ms
        .unwrap_or(DEFAULT_KV_RESPONSE_TIMEOUT_MS);
    if response_ms == 0 {
        return Err(LoadError::invalid(
            "kv.response_timeout_ms",
            "must be greater than zero",
        ));
    }

    let capacity_value = kv.memory_capacity.unwrap_or(DEFAULT_KV_MEMORY_CAPACITY);
    let memory_capacity = usize::try_from(capacity_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("kv.memory_capacity", "must be a positive entry count")
        })?;

    Ok(KvSettings {
        redis_url: non_blank(kv.redis_url),
        connection_timeout: Duration::from_millis(connection_ms),
        response_timeout: Duration::from_millis(response_ms),
        retries: kv.retries.unwrap_or(DEFAULT_KV_RETRIES),
        memory_capacity,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let list = cache.list_ttl_seconds.unwrap_or(DEFAULT_LIST_TTL_SECS);
    let page = cache.page_ttl_seconds.unwrap_or(DEFAULT_PAGE_TTL_SECS);
    let detail = cache.detail_ttl_seconds.unwrap_or(DEFAULT_DETAIL_TTL_SECS);

    for (key, value) in [
        ("cache.list_ttl_seconds", list),
        ("cache.page_ttl_seconds", page),
        ("cache.detail_ttl_seconds", detail),
    ] {
        if value == 0 {
            return Err(LoadError::invalid(key, "must be greater than zero"));
        }
    }

    let per_page = cache.per_page.unwrap_or(DEFAULT_INDEX_PER_PAGE);

    Ok(CacheSettings {
        list_ttl: Duration::from_secs(list),
        page_ttl: Duration::from_secs(page),
        detail_ttl: Duration::from_secs(detail),
        per_page: non_zero_u32(per_page, "cache.per_page")?,
    })
}

fn build_search_settings(search: RawSearchSettings) -> Result<SearchSettings, LoadError> {
    let batch = search
        .rebuild_batch_size
        .unwrap_or(DEFAULT_REBUILD_BATCH_SIZE);

    Ok(SearchSettings {
        rebuild_batch_size: non_zero_u32(batch, "search.rebuild_batch_size")?,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "uploads.directory",
            "path must not be empty",
        ));
    }

    let public_base_url = non_blank(uploads.public_base_url)
        .unwrap_or_else(|| DEFAULT_UPLOAD_PUBLIC_BASE_URL.to_string());
    let public_base_url = parse_base_url(&public_base_url, "uploads.public_base_url")?;

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        public_base_url,
        max_request_bytes,
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let relay_url = match non_blank(mail.relay_url) {
        Some(value) => Some(parse_base_url(&value, "mail.relay_url")?),
        None => None,
    };

    let from_address = non_blank(mail.from_address)
        .unwrap_or_else(|| DEFAULT_MAIL_FROM_ADDRESS.to_string());
    if !from_address.contains('@') {
        return Err(LoadError::invalid(
            "mail.from_address",
            "must be an email address",
        ));
    }

    Ok(MailSettings {
        relay_url,
        from_address,
        app_name: non_blank(mail.app_name).unwrap_or_else(|| DEFAULT_MAIL_APP_NAME.to_string()),
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let cron = non_blank(scheduler.cron).unwrap_or_else(|| DEFAULT_SCHEDULER_CRON.to_string());
    crate::application::jobs::publish_schedule(&cron)
        .map_err(|reason| LoadError::invalid("scheduler.cron", reason))?;

    Ok(SchedulerSettings {
        cron,
        enabled: scheduler.enabled.unwrap_or(true),
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let email = jobs
        .email_concurrency
        .unwrap_or(DEFAULT_JOB_EMAIL_CONCURRENCY);

    Ok(JobsSettings {
        email_concurrency: non_zero_u32(email.into(), "jobs.email_concurrency")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    environment: Option<String>,
    frontend_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    redis_url: Option<String>,
    connection_timeout_ms: Option<u64>,
    response_timeout_ms: Option<u64>,
    retries: Option<u32>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    list_ttl_seconds: Option<u64>,
    page_ttl_seconds: Option<u64>,
    detail_ttl_seconds: Option<u64>,
    per_page: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSearchSettings {
    rebuild_batch_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    public_base_url: Option<String>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    relay_url: Option<String>,
    from_address: Option<String>,
    app_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    cron: Option<String>,
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    email_concurrency: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_base_url(value: &str, key: &'static str) -> Result<String, LoadError> {
    url::Url::parse(value).map_err(|err| LoadError::invalid(key, format!("invalid URL: {err}")))?;
    Ok(value.trim_end_matches('/').to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_any_source() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(
            settings.server.environment,
            DeploymentEnvironment::Production
        );
        assert_eq!(settings.server.frontend_url, DEFAULT_FRONTEND_URL);
        assert_eq!(settings.cache.list_ttl, Duration::from_secs(600));
        assert_eq!(settings.cache.page_ttl, Duration::from_secs(60));
        assert_eq!(settings.cache.per_page.get(), 10);
        assert_eq!(settings.search.rebuild_batch_size.get(), 500);
        assert_eq!(
            settings.uploads.max_request_bytes.get(),
            DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
        );
        assert!(settings.kv.redis_url.is_none());
        assert!(settings.mail.relay_url.is_none());
        assert!(settings.scheduler.enabled);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.kv.redis_url = Some("redis://file".to_string());

        let overrides = ServeOverrides {
            port: Some(4321),
            log_level: Some("debug".to_string()),
            storage: StorageOverrides {
                redis_url: Some("redis://cli".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.kv.redis_url.as_deref(), Some("redis://cli"));
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn frontend_url_drops_trailing_slash() {
        let mut raw = RawSettings::default();
        raw.server.frontend_url = Some("https://blog.example.com/".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.server.frontend_url, "https://blog.example.com");
    }

    #[test]
    fn zero_per_page_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.per_page = Some(0);

        let err = Settings::from_raw(raw).expect_err("per_page must be positive");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.per_page",
                ..
            }
        ));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let mut raw = RawSettings::default();
        raw.server.environment = Some("staging".to_string());

        let err = Settings::from_raw(raw).expect_err("environment must be known");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "server.environment",
                ..
            }
        ));
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let mut raw = RawSettings::default();
        raw.scheduler.cron = Some("every minute".to_string());

        let err = Settings::from_raw(raw).expect_err("cron must parse");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "scheduler.cron",
                ..
            }
        ));
    }

    #[test]
    fn operational_endpoints_are_gated_by_environment() {
        assert!(DeploymentEnvironment::Local.allows_operational_endpoints());
        assert!(DeploymentEnvironment::Testing.allows_operational_endpoints());
        assert!(!DeploymentEnvironment::Production.allows_operational_endpoints());
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["quire"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "quire",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--database-url",
            "postgres://override",
            "--redis-url",
            "redis://cache:6379",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.storage.database.database_url.as_deref(),
                    Some("postgres://override")
                );
                assert_eq!(
                    serve.overrides.storage.redis_url.as_deref(),
                    Some("redis://cache:6379")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_create_user_arguments() {
        let args = CliArgs::parse_from([
            "quire",
            "create-user",
            "--name",
            "Ada",
            "--email",
            "ada@example.com",
        ]);

        match args.command.expect("create-user command") {
            Command::CreateUser(create) => {
                assert_eq!(create.name, "Ada");
                assert_eq!(create.email, "ada@example.com");
                assert!(create.database.database_url.is_none());
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_publish_scheduled_arguments() {
        let args = CliArgs::parse_from([
            "quire",
            "publish-scheduled",
            "--database-url",
            "postgres://example",
        ]);

        match args.command.expect("publish-scheduled command") {
            Command::PublishScheduled(database) => {
                assert_eq!(database.database_url.as_deref(), Some("postgres://example"));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
