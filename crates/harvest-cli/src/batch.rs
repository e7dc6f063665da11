//! `harvest batch`: drive a batch through the orchestrator service and report
//! progress on stdout.

use std::{path::Path, sync::Arc, time::Duration};

use harvest_core::ScraperSettings;
use harvest_scraper::{
    spawn_service, ApiClient, BatchOptions, BatchSummary, HttpBrowser, Orchestrator,
    OrchestratorHandle, OutcomeKind, ProgressEvent, ServiceEvent, SettingsStore, TabController,
    TabTiming, UrlOutcome,
};
use tokio::sync::broadcast::error::RecvError;

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Splits a URL list file into entries, skipping blank lines and `#` comments.
pub(crate) fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

/// Positional URLs first, then those read from `file`.
///
/// # Errors
///
/// Returns an error if `file` cannot be read.
pub(crate) async fn collect_urls(
    mut urls: Vec<String>,
    file: Option<&Path>,
) -> anyhow::Result<Vec<String>> {
    if let Some(path) = file {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read url list {}: {e}", path.display()))?;
        urls.extend(parse_url_list(&text));
    }
    Ok(urls)
}

fn spawn(settings: &ScraperSettings) -> anyhow::Result<OrchestratorHandle> {
    let browser = Arc::new(HttpBrowser::new(&settings.user_agent, settings.tab_timeout())?);
    let tabs = TabController::new(
        browser,
        TabTiming {
            poll_interval: settings.poll_interval(),
            settle_delay: settings.settle_delay(),
        },
    );
    let sink = Arc::new(
        ApiClient::new(&settings.api_base_url, API_TIMEOUT)?
            .with_api_key(settings.api_key.as_deref()),
    );
    let orchestrator = Orchestrator::new(tabs, sink, BatchOptions::from_settings(settings));
    let store = Arc::new(SettingsStore::new(settings.settings_path.clone()));

    let (handle, _task) = spawn_service(orchestrator, Some(store));
    Ok(handle)
}

/// Runs one batch to completion. Ctrl-C asks the service to stop after the
/// profile in flight.
///
/// # Errors
///
/// Returns an error if the batch is rejected, the service crashes, or the
/// service stops before reporting a summary.
pub(crate) async fn run_batch(
    settings: &ScraperSettings,
    urls: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let handle = spawn(settings)?;
    let mut events = handle.subscribe();

    tracing::info!(
        urls = urls.len(),
        api = %settings.api_base_url,
        "starting batch"
    );
    handle.start_batch_processing(urls).await?;

    let mut stop_requested = false;
    let summary = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ServiceEvent::ProgressUpdate(progress)) => {
                    if !json {
                        println!("{}", progress_line(&progress));
                    }
                }
                Ok(ServiceEvent::BatchCompleted(summary) | ServiceEvent::BatchCancelled(summary)) => {
                    break summary;
                }
                Ok(ServiceEvent::BatchCrashed(message)) => {
                    anyhow::bail!("batch crashed: {message}");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "progress output fell behind; some lines were dropped");
                }
                Err(RecvError::Closed) => anyhow::bail!("scraper service stopped unexpectedly"),
            },
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal?;
                stop_requested = true;
                eprintln!("stopping after the current profile...");
                handle.stop_batch_processing().await?;
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary_line(&summary));
    }
    Ok(())
}

fn outcome_label(outcome: &UrlOutcome) -> &'static str {
    match outcome.kind {
        OutcomeKind::Created => "created",
        OutcomeKind::Duplicate => "skipped",
        OutcomeKind::Error if outcome.network => "offline",
        OutcomeKind::Error => "error",
    }
}

/// One status line per finished URL.
pub(crate) fn progress_line(progress: &ProgressEvent) -> String {
    let outcome = &progress.last_outcome;
    let mut line = format!(
        "[{}/{}] {:<7} {}",
        progress.processed,
        progress.total,
        outcome_label(outcome),
        outcome.url
    );
    if let Some(id) = outcome.id {
        line.push_str(&format!(" (id {id})"));
    }
    if let Some(message) = outcome.message.as_deref() {
        line.push_str(&format!(": {message}"));
    }
    line
}

pub(crate) fn summary_line(summary: &BatchSummary) -> String {
    let verb = if summary.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    #[allow(clippy::cast_precision_loss)]
    let seconds = summary.elapsed_ms as f64 / 1_000.0;
    format!(
        "batch {verb}: {processed}/{total} processed, {created} created, {skipped} skipped, \
         {errors} errors, success rate {rate:.1}% in {seconds:.1}s",
        processed = summary.processed,
        total = summary.total,
        created = summary.success,
        skipped = summary.duplicates,
        errors = summary.errors,
        rate = summary.success_rate() * 100.0,
    )
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
