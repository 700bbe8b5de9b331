use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contact_harvester::config::{ConfigArgs, build_config};
use contact_harvester::export::{export_results, write_results};
use contact_harvester::input::{parse_url_list, validate_batch};
use contact_harvester::jobs::new_job_id;
use contact_harvester::processor::scrape_all;
use contact_harvester::{Harvester, api};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Harvest emails, phone numbers and social profiles from websites", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every URL in a .csv, .xlsx or .txt file
    Scrape {
        /// Path to the URL list
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the output CSV file (defaults to a timestamped file in the results directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = build_config(&cli.config)?;

    match cli.command {
        Commands::Scrape { input, output } => {
            info!("Scraping URLs from {}", input.display());
            scrape_file(config, input, output).await?;
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            api::start_api_server(config).await?;
        }
    }

    Ok(())
}

async fn scrape_file(
    config: contact_harvester::config::Config,
    input: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = std::fs::read(&input)
        .with_context(|| format!("Failed to read URL list {}", input.display()))?;
    let filename = input.to_string_lossy();
    let urls = parse_url_list(&filename, &bytes)?;
    let targets = validate_batch(urls, usize::MAX)?;

    info!("Loaded {} URLs from {}", targets.len(), input.display());

    let harvester = Arc::new(Harvester::new(&config)?);

    let progress_bar = indicatif::ProgressBar::new(targets.len() as u64);
    progress_bar.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut results = Vec::with_capacity(targets.len());
    scrape_all(harvester, targets, config.workers, |result| {
        progress_bar.set_message(result.domain.clone());
        progress_bar.inc(1);
        results.push(result);
    })
    .await;

    progress_bar.finish_with_message("Scraping complete");

    let successful = results.iter().filter(|r| r.status.is_success()).count();
    let emails: usize = results.iter().map(|r| r.emails.len()).sum();
    info!(
        "{} of {} URLs scraped successfully, {} emails found",
        successful,
        results.len(),
        emails
    );

    let path = match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_results(&results, file)?;
            path
        }
        None => export_results(&results, &config.results_dir, &new_job_id())?,
    };

    info!("Wrote {} results to {}", results.len(), path.display());

    Ok(())
}
