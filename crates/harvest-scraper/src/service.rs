//! The orchestrator service: a background task that owns batch state and
//! answers commands from UI handles.
//!
//! Commands travel over an mpsc channel with a oneshot responder each.
//! Progress and terminal events fan out over a broadcast channel.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api_client::{ApiConnection, ProfileSink};
use crate::browser::Browser;
use crate::error::ServiceError;
use crate::orchestrator::{
    BatchJob, BatchSummary, CancelFlag, Orchestrator, OutcomeKind, ProgressEvent,
};
use crate::settings::SettingsStore;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStatus {
    pub state: BatchState,
    pub processed: usize,
    pub total: usize,
    pub success: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub current_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_summary: Option<BatchSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServiceEvent {
    ProgressUpdate(ProgressEvent),
    BatchCompleted(BatchSummary),
    BatchCancelled(BatchSummary),
    BatchCrashed(String),
}

#[derive(Debug)]
enum Command {
    StartBatch {
        urls: Vec<String>,
        responder: oneshot::Sender<Result<(), ServiceError>>,
    },
    StopBatch {
        responder: oneshot::Sender<bool>,
    },
    GetStatus {
        responder: oneshot::Sender<ProcessingStatus>,
    },
    TestApi {
        responder: oneshot::Sender<ApiConnection>,
    },
}

/// Cheap, cloneable front door to a running service.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ServiceEvent>,
}

impl OrchestratorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (responder, reply) = oneshot::channel();
        self.commands
            .send(build(responder))
            .await
            .map_err(|_| ServiceError::ServiceStopped)?;
        reply.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Validates `urls` and starts a batch in the background.
    ///
    /// # Errors
    ///
    /// Returns the validation error from [`BatchJob::new`],
    /// [`ServiceError::AlreadyRunning`] while another batch runs, or
    /// [`ServiceError::ServiceStopped`] if the service task has exited.
    pub async fn start_batch_processing(&self, urls: Vec<String>) -> Result<(), ServiceError> {
        self.request(|responder| Command::StartBatch { urls, responder })
            .await?
    }

    /// Signals the running batch to stop before its next URL. Returns
    /// `false` when nothing was running.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceStopped`] if the service task has exited.
    pub async fn stop_batch_processing(&self) -> Result<bool, ServiceError> {
        self.request(|responder| Command::StopBatch { responder })
            .await
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceStopped`] if the service task has exited.
    pub async fn get_processing_status(&self) -> Result<ProcessingStatus, ServiceError> {
        self.request(|responder| Command::GetStatus { responder })
            .await
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceStopped`] if the service task has exited.
    pub async fn test_api_connection(&self) -> Result<ApiConnection, ServiceError> {
        self.request(|responder| Command::TestApi { responder })
            .await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }
}

struct Service<B, S> {
    orchestrator: Arc<Orchestrator<B, S>>,
    status: Arc<Mutex<ProcessingStatus>>,
    events: broadcast::Sender<ServiceEvent>,
    store: Option<Arc<SettingsStore>>,
    running: Option<(CancelFlag, JoinHandle<()>)>,
}

fn lock(status: &Mutex<ProcessingStatus>) -> MutexGuard<'_, ProcessingStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawns the service task and returns a handle to it.
///
/// The task exits once every handle is dropped, cancelling any running batch.
/// When `store` is given, each finished batch is folded into its lifetime
/// statistics.
pub fn spawn_service<B, S>(
    orchestrator: Orchestrator<B, S>,
    store: Option<Arc<SettingsStore>>,
) -> (OrchestratorHandle, JoinHandle<()>)
where
    B: Browser,
    S: ProfileSink,
{
    let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let service = Service {
        orchestrator: Arc::new(orchestrator),
        status: Arc::new(Mutex::new(ProcessingStatus::default())),
        events: events.clone(),
        store,
        running: None,
    };
    let task = tokio::spawn(service.run(receiver));
    (OrchestratorHandle { commands, events }, task)
}

impl<B: Browser, S: ProfileSink> Service<B, S> {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::StartBatch { urls, responder } => {
                    let _ = responder.send(self.start(&urls));
                }
                Command::StopBatch { responder } => {
                    let _ = responder.send(self.stop());
                }
                Command::GetStatus { responder } => {
                    let _ = responder.send(lock(&self.status).clone());
                }
                Command::TestApi { responder } => {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    tokio::spawn(async move {
                        let connection = orchestrator.sink().check_connection().await;
                        let _ = responder.send(connection);
                    });
                }
            }
        }

        if let Some((cancel, task)) = self.running.take() {
            cancel.cancel();
            let _ = task.await;
        }
        tracing::debug!("orchestrator service stopped");
    }

    fn start(&mut self, urls: &[String]) -> Result<(), ServiceError> {
        if lock(&self.status).state == BatchState::Running {
            return Err(ServiceError::AlreadyRunning);
        }
        let cancel = CancelFlag::default();
        let job = BatchJob::new(urls, cancel.clone())?;

        {
            let mut status = lock(&self.status);
            let last_summary = status.last_summary.take();
            *status = ProcessingStatus {
                state: BatchState::Running,
                total: job.total(),
                started_at: Some(job.started_at()),
                last_summary,
                ..ProcessingStatus::default()
            };
        }

        let task = tokio::spawn(run_batch(
            Arc::clone(&self.orchestrator),
            job,
            Arc::clone(&self.status),
            self.events.clone(),
            self.store.clone(),
        ));
        self.running = Some((cancel, task));
        Ok(())
    }

    fn stop(&mut self) -> bool {
        if lock(&self.status).state != BatchState::Running {
            return false;
        }
        match &self.running {
            Some((cancel, _)) => {
                cancel.cancel();
                tracing::info!("batch cancellation requested");
                true
            }
            None => false,
        }
    }
}

async fn run_batch<B: Browser, S: ProfileSink>(
    orchestrator: Arc<Orchestrator<B, S>>,
    job: BatchJob,
    status: Arc<Mutex<ProcessingStatus>>,
    events: broadcast::Sender<ServiceEvent>,
    store: Option<Arc<SettingsStore>>,
) {
    let progress_status = Arc::clone(&status);
    let progress_events = events.clone();
    let on_progress = move |event: &ProgressEvent| {
        {
            let mut status = lock(&progress_status);
            status.processed = event.processed;
            status.current_url = Some(event.current_url.clone());
            match event.last_outcome.kind {
                OutcomeKind::Created => status.success += 1,
                OutcomeKind::Duplicate => status.duplicates += 1,
                OutcomeKind::Error => status.errors += 1,
            }
        }
        let _ = progress_events.send(ServiceEvent::ProgressUpdate(event.clone()));
    };

    let result = AssertUnwindSafe(orchestrator.run(job, on_progress))
        .catch_unwind()
        .await;

    match result {
        Ok(summary) => {
            if let Some(store) = &store {
                if let Err(e) = store.record_batch(&summary).await {
                    tracing::warn!(error = %e, "failed to persist batch statistics");
                }
            }
            {
                let mut status = lock(&status);
                status.state = if summary.cancelled {
                    BatchState::Cancelled
                } else {
                    BatchState::Completed
                };
                status.current_url = None;
                status.last_summary = Some(summary.clone());
            }
            let event = if summary.cancelled {
                ServiceEvent::BatchCancelled(summary)
            } else {
                ServiceEvent::BatchCompleted(summary)
            };
            let _ = events.send(event);
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "batch task panicked".to_string());
            tracing::error!(error = %message, "batch crashed; resetting orchestrator");
            orchestrator.tabs().close_all_tracked().await;
            {
                let mut status = lock(&status);
                let last_summary = status.last_summary.take();
                *status = ProcessingStatus {
                    last_summary,
                    ..ProcessingStatus::default()
                };
            }
            let _ = events.send(ServiceEvent::BatchCrashed(message));
        }
    }
}
