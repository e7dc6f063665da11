mod batch;
mod inspect;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::settings::SettingsCommands;

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Scrape LinkedIn profile pages in batches and store them via the harvest API")]
struct Cli {
    /// Override the API base URL for this invocation
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape a list of profile URLs one at a time and submit each to the API
    Batch {
        /// Profile URLs, in processing order
        urls: Vec<String>,

        /// Read additional URLs from a file, one per line (`#` starts a comment)
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Print the final summary as JSON instead of a status line
        #[arg(long)]
        json: bool,
    },
    /// Check whether the API is reachable
    TestApi,
    /// Run the extractor on a saved HTML page and print the record as JSON
    Extract {
        /// Path to the saved page
        html_file: PathBuf,

        /// URL the page was saved from
        #[arg(long, default_value = "https://www.linkedin.com/in/unknown")]
        url: String,
    },
    /// Show lifetime batch statistics
    Stats,
    /// Show or change persisted scraper settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = harvest_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let scraper = settings::resolve(&config.scraper, cli.api_base_url.as_deref()).await?;

    match cli.command {
        Some(Commands::Batch { urls, file, json }) => {
            let urls = batch::collect_urls(urls, file.as_deref()).await?;
            batch::run_batch(&scraper, urls, json).await?;
        }
        Some(Commands::TestApi) => inspect::run_test_api(&scraper).await?,
        Some(Commands::Extract { html_file, url }) => {
            inspect::run_extract(&html_file, &url).await?;
        }
        Some(Commands::Stats) => settings::run_stats(&scraper).await?,
        Some(Commands::Settings { command }) => {
            settings::run_settings(&scraper, command).await?;
        }
        None => println!("harvest: run with --help to list commands"),
    }

    Ok(())
}
