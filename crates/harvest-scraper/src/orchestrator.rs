//! Sequential batch processing of profile URLs.
//!
//! Each URL goes through the tab controller under the retry policy, the
//! extracted record is posted to the backend, and the outcome is tallied.
//! URLs are processed strictly in order with a fixed delay between them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use harvest_core::{normalize_profile_url, ScraperSettings};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::api_client::{CreateOutcome, ProfileSink};
use crate::browser::Browser;
use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use crate::tab::TabController;

pub const MIN_BATCH_SIZE: usize = 3;
/// Matches the backend's batch endpoint cap.
pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Created,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlOutcome {
    pub url: String,
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The created id, or the existing id for a duplicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The backend could not be reached at all.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub network: bool,
}

impl UrlOutcome {
    fn error(url: &str, message: String) -> Self {
        Self {
            url: url.to_string(),
            kind: OutcomeKind::Error,
            message: Some(message),
            id: None,
            network: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<UrlOutcome>,
}

impl BatchSummary {
    /// Created profiles as a fraction of processed URLs, 0 when none ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.success as f64 / self.processed as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
    pub current_url: String,
    pub last_outcome: UrlOutcome,
}

/// Cooperative cancellation shared between the service and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory state of one batch run.
#[derive(Debug)]
pub struct BatchJob {
    urls: Vec<String>,
    processed: usize,
    success: usize,
    duplicates: usize,
    errors: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    cancel: CancelFlag,
    outcomes: Vec<UrlOutcome>,
}

impl BatchJob {
    /// Validates and normalizes the URL list.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::BatchTooSmall`] for fewer than [`MIN_BATCH_SIZE`] URLs.
    /// - [`ServiceError::BatchTooLarge`] for more than [`MAX_BATCH_SIZE`] URLs.
    /// - [`ServiceError::InvalidUrl`] for the first URL that is not a profile URL.
    pub fn new(urls: &[String], cancel: CancelFlag) -> Result<Self, ServiceError> {
        if urls.len() < MIN_BATCH_SIZE {
            return Err(ServiceError::BatchTooSmall {
                min: MIN_BATCH_SIZE,
                got: urls.len(),
            });
        }
        if urls.len() > MAX_BATCH_SIZE {
            return Err(ServiceError::BatchTooLarge {
                max: MAX_BATCH_SIZE,
                got: urls.len(),
            });
        }
        let urls = urls
            .iter()
            .enumerate()
            .map(|(index, url)| {
                normalize_profile_url(url).map_err(|e| ServiceError::InvalidUrl {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            outcomes: Vec::with_capacity(urls.len()),
            urls,
            processed: 0,
            success: 0,
            duplicates: 0,
            errors: 0,
            started_at: Utc::now(),
            started: Instant::now(),
            cancel,
        })
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn record(&mut self, outcome: UrlOutcome) {
        self.processed += 1;
        match outcome.kind {
            OutcomeKind::Created => self.success += 1,
            OutcomeKind::Duplicate => self.duplicates += 1,
            OutcomeKind::Error => self.errors += 1,
        }
        self.outcomes.push(outcome);
    }

    fn finish(self, cancelled: bool) -> BatchSummary {
        BatchSummary {
            total: self.urls.len(),
            processed: self.processed,
            success: self.success,
            duplicates: self.duplicates,
            errors: self.errors,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cancelled,
            started_at: self.started_at,
            outcomes: self.outcomes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub tab_timeout: Duration,
    pub inter_request_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            tab_timeout: Duration::from_secs(30),
            inter_request_delay: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn from_settings(settings: &ScraperSettings) -> Self {
        Self {
            tab_timeout: settings.tab_timeout(),
            inter_request_delay: settings.inter_request_delay(),
            retry: RetryPolicy::new(settings.max_attempts, settings.retry_backoff()),
        }
    }
}

pub struct Orchestrator<B, S> {
    tabs: TabController<B>,
    sink: Arc<S>,
    options: BatchOptions,
}

impl<B: Browser, S: ProfileSink> Orchestrator<B, S> {
    pub fn new(tabs: TabController<B>, sink: Arc<S>, options: BatchOptions) -> Self {
        Self {
            tabs,
            sink,
            options,
        }
    }

    #[must_use]
    pub fn tabs(&self) -> &TabController<B> {
        &self.tabs
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Processes every URL of `job` in order and returns the summary.
    ///
    /// `on_progress` is called once per processed URL. Cancellation is
    /// checked before each URL; once observed, tracked tabs are closed and
    /// the summary is returned with `cancelled` set.
    pub async fn run<F>(&self, mut job: BatchJob, mut on_progress: F) -> BatchSummary
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let total = job.total();
        tracing::info!(total, "batch started");

        for index in 0..total {
            if job.cancel.is_cancelled() {
                tracing::info!(processed = job.processed, total, "batch cancelled");
                self.tabs.close_all_tracked().await;
                return job.finish(true);
            }

            let url = job.urls[index].clone();
            let outcome = self.process_url(&url).await;
            job.record(outcome.clone());
            on_progress(&ProgressEvent {
                processed: job.processed,
                total,
                current_url: url,
                last_outcome: outcome,
            });

            if index + 1 < total {
                tokio::time::sleep(self.options.inter_request_delay).await;
            }
        }

        let summary = job.finish(false);
        tracing::info!(
            total = summary.total,
            success = summary.success,
            duplicates = summary.duplicates,
            errors = summary.errors,
            elapsed_ms = summary.elapsed_ms,
            "batch completed"
        );
        summary
    }

    async fn process_url(&self, url: &str) -> UrlOutcome {
        let timeout = self.options.tab_timeout;
        let extracted = self
            .options
            .retry
            .run(move |attempt| {
                tracing::debug!(url, attempt, "extracting profile");
                self.tabs.open_and_extract(url, timeout)
            })
            .await;

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(url, error = %e, "profile extraction failed");
                return UrlOutcome::error(url, e.to_string());
            }
        };

        match self.sink.create_profile(&record).await {
            CreateOutcome::Created { id } => {
                tracing::info!(url, id, status = %record.extraction_status, "profile saved");
                UrlOutcome {
                    url: url.to_string(),
                    kind: OutcomeKind::Created,
                    message: None,
                    id: Some(id),
                    network: false,
                }
            }
            CreateOutcome::Duplicate {
                existing_id,
                message,
            } => {
                tracing::info!(url, ?existing_id, "profile already stored");
                UrlOutcome {
                    url: url.to_string(),
                    kind: OutcomeKind::Duplicate,
                    message: Some(message),
                    id: existing_id,
                    network: false,
                }
            }
            CreateOutcome::Error { message, network } => {
                tracing::warn!(url, network, error = %message, "backend rejected profile");
                UrlOutcome {
                    network,
                    ..UrlOutcome::error(url, message)
                }
            }
        }
    }
}
