//! One-shot diagnostic commands: API connectivity and offline extraction.

use std::{path::Path, time::Duration};

use harvest_core::ScraperSettings;
use harvest_scraper::{ApiClient, ProfileSink};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn run_test_api(settings: &ScraperSettings) -> anyhow::Result<()> {
    let client = ApiClient::new(&settings.api_base_url, HEALTH_TIMEOUT)?;
    let connection = client.check_connection().await;
    if connection.online {
        println!("online: {} ({})", client.base_url(), connection.message);
        Ok(())
    } else {
        anyhow::bail!("offline: {} ({})", client.base_url(), connection.message)
    }
}

/// Extracts a saved page without touching the network.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub(crate) async fn run_extract(html_file: &Path, url: &str) -> anyhow::Result<()> {
    let html = tokio::fs::read_to_string(html_file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", html_file.display()))?;
    let record = harvest_scraper::extract_profile(&html, url);
    tracing::debug!(status = %record.extraction_status.as_str(), "extracted page");
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
