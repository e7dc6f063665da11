use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Timing and endpoint settings for the batch scraper.
///
/// Shared between the CLI and anything else that drives the orchestrator.
/// Durations are stored in their env-var units and converted on demand.
#[derive(Clone, PartialEq, Eq)]
pub struct ScraperSettings {
    pub api_base_url: String,
    /// Bearer token for the backend's `/profiles` routes.
    pub api_key: Option<String>,
    pub tab_timeout_secs: u64,
    pub tab_poll_interval_ms: u64,
    pub tab_settle_delay_ms: u64,
    pub inter_request_delay_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub user_agent: String,
    pub settings_path: PathBuf,
}

impl ScraperSettings {
    #[must_use]
    pub fn tab_timeout(&self) -> Duration {
        Duration::from_secs(self.tab_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tab_poll_interval_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.tab_settle_delay_ms)
    }

    #[must_use]
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl std::fmt::Debug for ScraperSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperSettings")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("tab_timeout_secs", &self.tab_timeout_secs)
            .field("tab_poll_interval_ms", &self.tab_poll_interval_ms)
            .field("tab_settle_delay_ms", &self.tab_settle_delay_ms)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("user_agent", &self.user_agent)
            .field("settings_path", &self.settings_path)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Required by the server; the CLI runs without it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub rate_limit_per_minute: usize,
    pub scraper: ScraperSettings,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("scraper", &self.scraper)
            .finish()
    }
}
