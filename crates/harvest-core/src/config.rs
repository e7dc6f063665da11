use crate::app_config::{AppConfig, Environment, ScraperSettings};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

impl AppConfig {
    /// Returns the database URL, which only the server requires.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

/// Core parsing/validation logic, decoupled from the process environment so it
/// can be tested with a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let env = parse_environment(&or_default("HARVEST_ENV", "development"))?;
    let bind_addr = parse_addr("HARVEST_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("HARVEST_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("HARVEST_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("HARVEST_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("HARVEST_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let rate_limit_per_minute = parse_usize("HARVEST_RATE_LIMIT_PER_MINUTE", "120")?;

    let api_base_url = or_default("HARVEST_API_BASE_URL", "http://localhost:3000");
    if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
        return Err(invalid(
            "HARVEST_API_BASE_URL",
            format!("expected an http(s) URL, got '{api_base_url}'"),
        ));
    }

    let max_attempts = parse_u32("HARVEST_MAX_ATTEMPTS", "2")?;
    if max_attempts == 0 {
        return Err(invalid(
            "HARVEST_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }

    let scraper = ScraperSettings {
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        api_key: lookup("HARVEST_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        tab_timeout_secs: parse_u64("HARVEST_TAB_TIMEOUT_SECS", "30")?,
        tab_poll_interval_ms: parse_u64("HARVEST_TAB_POLL_INTERVAL_MS", "500")?,
        tab_settle_delay_ms: parse_u64("HARVEST_TAB_SETTLE_DELAY_MS", "3000")?,
        inter_request_delay_ms: parse_u64("HARVEST_INTER_REQUEST_DELAY_MS", "5000")?,
        max_attempts,
        retry_backoff_ms: parse_u64("HARVEST_RETRY_BACKOFF_MS", "2000")?,
        user_agent: or_default("HARVEST_USER_AGENT", DEFAULT_USER_AGENT),
        settings_path: PathBuf::from(or_default(
            "HARVEST_SETTINGS_PATH",
            "./harvest-settings.json",
        )),
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        rate_limit_per_minute,
        scraper,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HARVEST_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
