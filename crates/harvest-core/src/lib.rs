pub mod app_config;
pub mod config;
pub mod profiles;

pub use app_config::{AppConfig, Environment, ScraperSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use profiles::{
    derive_status, normalize_profile_url, sanitize_count, EducationEntry, ExperienceEntry,
    ExtractionStatus, ProfileRecord, MAX_CONNECTIONS, MAX_EDUCATION, MAX_EXPERIENCE,
    MAX_FOLLOWERS, MAX_SKILLS,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid profile url '{url}': {reason}")]
    InvalidProfileUrl { url: String, reason: String },

    #[error("invalid extraction status: {0}")]
    InvalidStatus(String),

    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },
}
