use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Profiled key lookup: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
///
/// The lookup function is injectable so config parsing can be exercised
/// without touching the process environment.
struct EnvReader<'a> {
    profile: &'a str,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvReader<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|s| !s.is_empty())
    }

    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            let prefixed = format!("{}_{}", self.profile, key);
            if let Some(v) = self.raw(&prefixed) {
                return Some(v);
            }
        }
        self.raw(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.opt(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.opt(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" || v == "1" || v == "yes" => true,
            Some(v) if v == "false" || v == "0" || v == "no" => false,
            _ => default,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub scheduler: SchedulerConfig,
    pub remote: RemoteConfig,
    pub id_source: IdSourceConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `HARVEST_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let profile = lookup("HARVEST_PROFILE")
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        let r = EnvReader {
            profile: &profile,
            lookup,
        };
        Self {
            server: ServerConfig::from_reader(&r),
            postgres: PostgresConfig::from_reader(&r),
            scheduler: SchedulerConfig::from_reader(&r),
            remote: RemoteConfig::from_reader(&r),
            id_source: IdSourceConfig::from_reader(&r),
            profile,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:     {}:{}", self.server.host, self.server.port);
        tracing::info!("  postgres:   {}", self.postgres.redacted_url());
        tracing::info!(
            "  scheduler:  cron='{}', batch_size={}, delay={}ms, max_failures={}, dedupe={}, resume={}",
            self.scheduler.cron,
            self.scheduler.batch_size,
            self.scheduler.item_delay_ms,
            self.scheduler.max_item_failures,
            self.id_source.dedupe,
            self.scheduler.resume_from_checkpoint
        );
        tracing::info!(
            "  remote:     base_url={}, token={}",
            self.remote.base_url,
            if self.remote.bearer_token.is_some() { "set" } else { "(none)" }
        );
        tracing::info!("  id_source:  {}", self.id_source.path.display());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "postgres": {
                "url": self.postgres.redacted_url(),
                "maxConnections": self.postgres.max_connections,
            },
            "scheduler": {
                "cron": self.scheduler.cron,
                "batchSize": self.scheduler.batch_size,
                "itemDelayMs": self.scheduler.item_delay_ms,
                "maxItemFailures": self.scheduler.max_item_failures,
                "resumeFromCheckpoint": self.scheduler.resume_from_checkpoint,
            },
            "remote": {
                "baseUrl": self.remote.base_url,
                "lang": self.remote.lang,
                "configured": self.remote.is_configured(),
            },
            "idSource": { "path": self.id_source.path, "dedupe": self.id_source.dedupe },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_reader(r: &EnvReader<'_>) -> Self {
        Self {
            host: r.or("HOST", "0.0.0.0"),
            port: r.parsed("PORT", 3000),
            cors_origin: r.or("CORS_ORIGIN", "*"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection string; wins over the individual parts when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_reader(r: &EnvReader<'_>) -> Self {
        Self {
            url: r.opt("DATABASE_URL"),
            host: r.or("PG_HOST", "localhost"),
            port: r.parsed("PG_PORT", 5432),
            database: r.or("PG_DATABASE", "harvest"),
            username: r.opt("PG_USERNAME"),
            password: r.opt("PG_PASSWORD"),
            ssl_mode: r.or("PG_SSL_MODE", "prefer"),
            max_connections: r.parsed("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    /// Connection string with any password replaced by `***`.
    pub fn redacted_url(&self) -> String {
        let url = self.connection_string();
        let Some((scheme, rest)) = url.split_once("://") else {
            return url;
        };
        let Some((creds, host)) = rest.rsplit_once('@') else {
            return url;
        };
        match creds.split_once(':') {
            Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
            None => url,
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 5- or 6-field cron expression for automatic batch runs.
    pub cron: String,
    /// Items attempted per batch invocation.
    pub batch_size: usize,
    /// Pause between fetch/upsert attempts, in milliseconds.
    pub item_delay_ms: u64,
    /// Processing errors before an id is quarantined (0 = never).
    pub max_item_failures: u32,
    pub resume_from_checkpoint: bool,
}

impl SchedulerConfig {
    fn from_reader(r: &EnvReader<'_>) -> Self {
        let batch_size: usize = r.parsed("BATCH_SIZE", 10);
        Self {
            cron: r.or("CRON_SCHEDULE", "*/10 * * * *"),
            batch_size: if batch_size == 0 { 10 } else { batch_size },
            item_delay_ms: r.parsed("API_DELAY", 1000),
            max_item_failures: r.parsed("MAX_ITEM_FAILURES", 3),
            resume_from_checkpoint: r.flag("RESUME_FROM_CHECKPOINT", true),
        }
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "*/10 * * * *".to_string(),
            batch_size: 10,
            item_delay_ms: 1000,
            max_item_failures: 3,
            resume_from_checkpoint: true,
        }
    }
}

// ── Remote API ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub lang: String,
    pub referer: Option<String>,
    pub timeout_secs: u64,
}

impl RemoteConfig {
    fn from_reader(r: &EnvReader<'_>) -> Self {
        Self {
            base_url: r
                .or("REMOTE_BASE_URL", "https://backend.playliner.com/api/news")
                .trim_end_matches('/')
                .to_string(),
            bearer_token: r.opt("BEARER_TOKEN"),
            lang: r.or("REMOTE_LANG", "en"),
            referer: r.opt("REMOTE_REFERER"),
            timeout_secs: r.parsed("REMOTE_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bearer_token.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Id source ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdSourceConfig {
    pub path: PathBuf,
    /// Keep only the first occurrence of each id.
    pub dedupe: bool,
}

impl IdSourceConfig {
    fn from_reader(r: &EnvReader<'_>) -> Self {
        Self {
            path: PathBuf::from(r.or("ID_SOURCE_PATH", "data.json")),
            dedupe: r.flag("DEDUPE_IDS", false),
        }
    }
}
