//! Batch scraping of LinkedIn profile pages.
//!
//! Layers, leaf to root: [`extract`] turns a page into a record,
//! [`tab::TabController`] drives one browser tab through load and
//! extraction, [`orchestrator::Orchestrator`] sequences a batch of URLs, and
//! [`service`] exposes the whole thing as a message-passing handle.

pub mod api_client;
pub mod browser;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod retry;
pub mod service;
pub mod settings;
pub mod tab;

pub use api_client::{ApiClient, ApiConnection, CreateOutcome, HealthReport, ProfileSink};
pub use browser::{Browser, HttpBrowser, TabId, TabStatus};
pub use error::{ApiClientError, BrowserError, ServiceError, SettingsError, TabError};
pub use extract::extract_profile;
pub use orchestrator::{
    BatchJob, BatchOptions, BatchSummary, CancelFlag, Orchestrator, OutcomeKind, ProgressEvent,
    UrlOutcome, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
pub use retry::RetryPolicy;
pub use service::{
    spawn_service, BatchState, OrchestratorHandle, ProcessingStatus, ServiceEvent,
};
pub use settings::{LifetimeStats, PersistedState, SettingsOverrides, SettingsStore};
pub use tab::{TabController, TabTiming, TrackedTabs};
