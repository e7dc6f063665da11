//! Persisted scraper settings overrides and lifetime batch statistics.
//!
//! Both live in one JSON file owned by the orchestrator service. A missing
//! file reads as defaults.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use harvest_core::ScraperSettings;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::SettingsError;
use crate::orchestrator::BatchSummary;

/// User-chosen values that take precedence over the environment.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsOverrides {
    pub api_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub inter_request_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub tab_timeout_secs: Option<u64>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut ScraperSettings) {
        if let Some(base) = &self.api_base_url {
            settings.api_base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            settings.api_key = (!key.is_empty()).then(|| key.to_string());
        }
        if let Some(delay) = self.inter_request_delay_ms {
            settings.inter_request_delay_ms = delay;
        }
        if let Some(attempts) = self.max_attempts {
            settings.max_attempts = attempts.max(1);
        }
        if let Some(timeout) = self.tab_timeout_secs {
            settings.tab_timeout_secs = timeout;
        }
    }

    /// Copy safe to print: a stored key is replaced by a marker.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "[redacted]".to_string()),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for SettingsOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self.redacted();
        f.debug_struct("SettingsOverrides")
            .field("api_base_url", &shown.api_base_url)
            .field("api_key", &shown.api_key)
            .field("inter_request_delay_ms", &shown.inter_request_delay_ms)
            .field("max_attempts", &shown.max_attempts)
            .field("tab_timeout_secs", &shown.tab_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_batches: u64,
    pub total_processed: u64,
    pub total_created: u64,
    pub total_duplicates: u64,
    pub total_errors: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_rate: Option<f64>,
}

impl LifetimeStats {
    pub fn record(&mut self, summary: &BatchSummary) {
        let widen = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        self.total_batches += 1;
        self.total_processed += widen(summary.processed);
        self.total_created += widen(summary.success);
        self.total_duplicates += widen(summary.duplicates);
        self.total_errors += widen(summary.errors);
        self.last_run_at = Some(summary.started_at);
        self.last_success_rate = Some(summary.success_rate());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub settings: SettingsOverrides,
    pub stats: LifetimeStats,
}

/// Serialized access to the settings file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file exists but cannot be read or
    /// parsed.
    pub async fn load(&self) -> Result<PersistedState, SettingsError> {
        let _guard = self.guard.lock().await;
        self.read().await
    }

    /// Applies `update` to the stored overrides and persists the result.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] on read, parse, or write failure.
    pub async fn update_settings<F>(&self, update: F) -> Result<SettingsOverrides, SettingsError>
    where
        F: FnOnce(&mut SettingsOverrides),
    {
        let _guard = self.guard.lock().await;
        let mut state = self.read().await?;
        update(&mut state.settings);
        self.write(&state).await?;
        Ok(state.settings)
    }

    /// Folds a finished batch into the lifetime statistics.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] on read, parse, or write failure.
    pub async fn record_batch(&self, summary: &BatchSummary) -> Result<LifetimeStats, SettingsError> {
        let _guard = self.guard.lock().await;
        let mut state = self.read().await?;
        state.stats.record(summary);
        self.write(&state).await?;
        Ok(state.stats)
    }

    async fn read(&self) -> Result<PersistedState, SettingsError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedState::default())
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| SettingsError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Writes to a sibling temp file first so a crash never leaves a
    /// truncated settings file behind.
    async fn write(&self, state: &PersistedState) -> Result<(), SettingsError> {
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let body = serde_json::to_vec_pretty(state).map_err(|source| SettingsError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
