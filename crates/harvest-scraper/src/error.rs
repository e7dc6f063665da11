use thiserror::Error;

use crate::browser::TabId;

/// Failures reported by a [`crate::browser::Browser`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("tab {0} no longer exists")]
    TabNotFound(TabId),

    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("browser backend error: {0}")]
    Backend(String),
}

/// Why a single open/load/extract cycle failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("page load timed out after {timeout_ms}ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("tab closed before extraction: {url}")]
    NotFound { url: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid API base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

/// Rejections from the batch service before or while a batch runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("a batch needs at least {min} URLs, got {got}")]
    BatchTooSmall { min: usize, got: usize },

    #[error("a batch accepts at most {max} URLs, got {got}")]
    BatchTooLarge { max: usize, got: usize },

    #[error("invalid profile URL at position {index}: {reason}")]
    InvalidUrl { index: usize, reason: String },

    #[error("a batch is already running")]
    AlreadyRunning,

    #[error("orchestrator service is not running")]
    ServiceStopped,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
