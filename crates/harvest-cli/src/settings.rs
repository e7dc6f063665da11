//! Persisted settings and lifetime statistics commands.

use clap::Subcommand;
use harvest_core::ScraperSettings;
use harvest_scraper::{LifetimeStats, SettingsOverrides, SettingsStore};

/// Sub-commands available under `settings`.
#[derive(Debug, Subcommand)]
pub enum SettingsCommands {
    /// Print the effective scraper settings and the persisted overrides
    Show,
    /// Persist one or more overrides; unspecified values are left as they are
    Set {
        /// API base URL to submit profiles to
        #[arg(long)]
        api_url: Option<String>,

        /// Bearer token sent with profile submissions; an empty value clears it
        #[arg(long)]
        api_key: Option<String>,

        /// Pause between profiles, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Attempts per profile before recording an error
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds to wait for a page to finish loading
        #[arg(long)]
        tab_timeout_secs: Option<u64>,
    },
    /// Drop every persisted override
    Reset,
}

/// Environment settings with persisted overrides applied, then the
/// command-line base URL on top.
///
/// # Errors
///
/// Returns an error if the settings file exists but cannot be read or parsed.
pub(crate) async fn resolve(
    env_settings: &ScraperSettings,
    api_base_url: Option<&str>,
) -> anyhow::Result<ScraperSettings> {
    let store = SettingsStore::new(env_settings.settings_path.clone());
    let persisted = store.load().await?;

    let mut settings = env_settings.clone();
    persisted.settings.apply(&mut settings);
    if let Some(base) = api_base_url {
        SettingsOverrides {
            api_base_url: Some(base.to_string()),
            ..SettingsOverrides::default()
        }
        .apply(&mut settings);
    }
    Ok(settings)
}

pub(crate) async fn run_settings(
    settings: &ScraperSettings,
    command: SettingsCommands,
) -> anyhow::Result<()> {
    let store = SettingsStore::new(settings.settings_path.clone());

    match command {
        SettingsCommands::Show => {
            let persisted = store.load().await?;
            println!("settings file: {}", store.path().display());
            println!("api base url:        {}", settings.api_base_url);
            println!("api key:             {}", api_key_status(settings));
            println!("tab timeout:         {}s", settings.tab_timeout_secs);
            println!("inter-request delay: {}ms", settings.inter_request_delay_ms);
            println!("max attempts:        {}", settings.max_attempts);
            println!(
                "persisted overrides: {}",
                serde_json::to_string(&persisted.settings.redacted())?
            );
        }
        SettingsCommands::Set {
            api_url,
            api_key,
            delay_ms,
            max_attempts,
            tab_timeout_secs,
        } => {
            if let Some(url) = api_url.as_deref() {
                harvest_scraper::ApiClient::new(url, settings.tab_timeout())?;
            }
            if max_attempts == Some(0) {
                anyhow::bail!("--max-attempts must be at least 1");
            }
            let updated = store
                .update_settings(|overrides| {
                    merge_overrides(
                        overrides,
                        SettingsOverrides {
                            api_base_url: api_url,
                            api_key,
                            inter_request_delay_ms: delay_ms,
                            max_attempts,
                            tab_timeout_secs,
                        },
                    );
                })
                .await?;
            println!("saved: {}", serde_json::to_string(&updated.redacted())?);
        }
        SettingsCommands::Reset => {
            store
                .update_settings(|overrides| *overrides = SettingsOverrides::default())
                .await?;
            println!("persisted overrides cleared");
        }
    }
    Ok(())
}

/// Copies every value present in `patch` into `current`.
pub(crate) fn merge_overrides(current: &mut SettingsOverrides, patch: SettingsOverrides) {
    if patch.api_base_url.is_some() {
        current.api_base_url = patch.api_base_url;
    }
    if patch.api_key.is_some() {
        current.api_key = patch.api_key;
    }
    if patch.inter_request_delay_ms.is_some() {
        current.inter_request_delay_ms = patch.inter_request_delay_ms;
    }
    if patch.max_attempts.is_some() {
        current.max_attempts = patch.max_attempts;
    }
    if patch.tab_timeout_secs.is_some() {
        current.tab_timeout_secs = patch.tab_timeout_secs;
    }
}

fn api_key_status(settings: &ScraperSettings) -> &'static str {
    if settings.api_key.is_some() {
        "set"
    } else {
        "not set"
    }
}

pub(crate) async fn run_stats(settings: &ScraperSettings) -> anyhow::Result<()> {
    let store = SettingsStore::new(settings.settings_path.clone());
    let stats = store.load().await?.stats;
    for line in stats_lines(&stats) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn stats_lines(stats: &LifetimeStats) -> Vec<String> {
    let last_run = stats
        .last_run_at
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    let last_rate = stats
        .last_success_rate
        .map_or_else(|| "n/a".to_string(), |rate| format!("{:.1}%", rate * 100.0));
    vec![
        format!("batches run:     {}", stats.total_batches),
        format!("urls processed:  {}", stats.total_processed),
        format!("created:         {}", stats.total_created),
        format!("duplicates:      {}", stats.total_duplicates),
        format!("errors:          {}", stats.total_errors),
        format!("last run:        {last_run}"),
        format!("last success:    {last_rate}"),
    ]
}
