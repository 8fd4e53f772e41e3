use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Group every live-update subscriber joins.
pub const DEFAULT_GROUP: &str = "blog_updates";
pub const DEFAULT_QUEUE_CAPACITY: usize = 256; // frames buffered per subscriber
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_DROPPED: u64 = 100; // evict a subscriber after this many full-queue drops
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // inbound WS frames are ignored but capped

/// Top-level config (miniblog.toml + MINIBLOG_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiniblogConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

/// Author authentication for the mutating HTTP endpoints.
///
/// The live-update socket itself is never authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_mode")]
    pub mode: AuthMode,
    #[serde(default)]
    pub authors: Vec<AuthorConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Token,
            authors: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Resolve a bearer token to the author it belongs to.
    pub fn author_for_token(&self, token: &str) -> Option<&str> {
        self.authors
            .iter()
            .find(|a| a.token == token)
            .map(|a| a.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Live-update fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// Full-queue drops tolerated before a subscriber is evicted.
    #[serde(default = "default_max_dropped")]
    pub max_dropped: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
            max_dropped: DEFAULT_MAX_DROPPED,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_auth_mode() -> AuthMode {
    AuthMode::Token
}
fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_publish_timeout_ms() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_MS
}
fn default_max_dropped() -> u64 {
    DEFAULT_MAX_DROPPED
}
fn default_heartbeat_interval_secs() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}
fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}
fn default_db_path() -> String {
    format!("{}/miniblog.db", miniblog_home())
}

impl MiniblogConfig {
    /// Load from a TOML file (default `~/.miniblog/miniblog.toml`) with
    /// `MINIBLOG_` env overrides. Nested keys use `__`, e.g.
    /// `MINIBLOG_LIVE__QUEUE_CAPACITY=64`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("MINIBLOG_").split("__")),
        )
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: MiniblogConfig = figment
            .extract()
            .map_err(|e| crate::error::MiniblogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create the directory the SQLite file lives in.
    pub fn ensure_database_dir(&self) -> crate::error::Result<()> {
        if let Some(parent) = std::path::Path::new(&self.database.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.live.group.trim().is_empty() {
            return Err(crate::error::MiniblogError::Config(
                "live.group must not be empty".to_string(),
            ));
        }
        if self.live.queue_capacity == 0 {
            return Err(crate::error::MiniblogError::Config(
                "live.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.live.heartbeat_interval_secs == 0 {
            return Err(crate::error::MiniblogError::Config(
                "live.heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.gateway.auth.mode == AuthMode::Token && self.gateway.auth.authors.is_empty() {
            tracing::warn!("auth mode is token but no authors are configured; all mutations will be rejected");
        }
        Ok(())
    }
}

fn miniblog_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.miniblog", home)
}

fn default_config_path() -> String {
    format!("{}/miniblog.toml", miniblog_home())
}
