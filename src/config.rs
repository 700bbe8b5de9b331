//! Defines the configuration settings for the contact-harvester application.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which page fetcher drives a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Plain HTTP requests.
    Http,
    /// Headless Chrome (requires the `browser` feature).
    Browser,
}

/// Configuration options shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, global = true, env = "HARVESTER_CONFIG")]
    pub config_file: Option<String>,

    /// Primary page request timeout in seconds
    #[arg(long, global = true, env = "HARVESTER_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Contact page request timeout in seconds
    #[arg(long, global = true, env = "HARVESTER_CONTACT_PAGE_TIMEOUT")]
    pub contact_page_timeout: Option<u64>,

    /// User agent string for HTTP requests
    #[arg(long, global = true, env = "HARVESTER_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Number of URLs scraped concurrently within a batch
    #[arg(short, long, global = true, env = "HARVESTER_WORKERS")]
    pub workers: Option<usize>,

    /// Default maximum number of URLs per batch
    #[arg(long, global = true, env = "HARVESTER_MAX_URLS_PER_BATCH")]
    pub max_urls_per_batch: Option<usize>,

    /// Maximum number of contact pages visited per URL
    #[arg(long, global = true, env = "HARVESTER_MAX_CONTACT_PAGES")]
    pub max_contact_pages: Option<usize>,

    /// Page fetcher to use
    #[arg(long, global = true, value_enum, env = "HARVESTER_FETCHER")]
    pub fetcher: Option<FetcherKind>,

    /// Directory where result spreadsheets are written
    #[arg(long, global = true, env = "HARVESTER_RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// JSON lines file recording finished jobs
    #[arg(long, global = true, env = "HARVESTER_HISTORY_FILE")]
    pub history_file: Option<PathBuf>,

    /// Seconds a finished job stays queryable
    #[arg(long, global = true, env = "HARVESTER_JOB_TTL")]
    pub job_ttl: Option<u64>,

    /// Maximum number of jobs kept in memory
    #[arg(long, global = true, env = "HARVESTER_MAX_JOBS")]
    pub max_jobs: Option<usize>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    network: Option<NetworkConfig>,
    scraping: Option<ScrapingConfig>,
    limits: Option<LimitsConfig>,
    jobs: Option<JobsConfig>,
    server: Option<ServerConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct NetworkConfig {
    request_timeout: Option<u64>,
    contact_page_timeout: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ScrapingConfig {
    fetcher: Option<FetcherKind>,
    max_contact_pages: Option<usize>,
    workers: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
struct LimitsConfig {
    max_urls_per_batch: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
struct JobsConfig {
    results_dir: Option<PathBuf>,
    history_file: Option<PathBuf>,
    job_ttl: Option<u64>,
    max_jobs: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
struct ServerConfig {
    port: Option<u16>,
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout for the primary page of a target.
    pub request_timeout: Duration,
    /// Timeout for each contact/about page.
    pub contact_page_timeout: Duration,
    /// User agent string to use for HTTP requests.
    pub user_agent: String,
    /// Worker pool size for a batch; 1 means sequential.
    pub workers: usize,
    /// Batch cap for callers that do not carry their own limit.
    pub max_urls_per_batch: usize,
    /// Contact pages visited per target; `None` picks the fetcher's default.
    pub max_contact_pages: Option<usize>,
    pub fetcher: FetcherKind,
    pub results_dir: PathBuf,
    /// Job history file; `None` disables history.
    pub history_file: Option<PathBuf>,
    /// How long a finished job stays in the job table.
    pub job_ttl: Duration,
    pub max_jobs: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_timeout: Duration::from_secs(30),
            contact_page_timeout: Duration::from_secs(15),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
            workers: 5,
            max_urls_per_batch: 100,
            max_contact_pages: None,
            fetcher: FetcherKind::Http,
            results_dir: PathBuf::from("results"),
            history_file: Some(PathBuf::from("results/job_history.jsonl")),
            job_ttl: Duration::from_secs(3600),
            max_jobs: 500,
            port: 8080,
        }
    }
}

impl Config {
    /// Number of contact pages the configured fetcher visits per target.
    pub fn contact_page_limit(&self) -> usize {
        self.max_contact_pages.unwrap_or(match self.fetcher {
            FetcherKind::Http => 1,
            FetcherKind::Browser => 3,
        })
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(network) = &file_config.network {
        if let Some(timeout) = network.request_timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(timeout) = network.contact_page_timeout {
            config.contact_page_timeout = Duration::from_secs(timeout);
        }
        if let Some(user_agent) = &network.user_agent {
            config.user_agent = user_agent.clone();
        }
    }

    if let Some(scraping) = &file_config.scraping {
        if let Some(fetcher) = scraping.fetcher {
            config.fetcher = fetcher;
        }
        if let Some(pages) = scraping.max_contact_pages {
            config.max_contact_pages = Some(pages);
        }
        if let Some(workers) = scraping.workers {
            config.workers = workers;
        }
    }

    if let Some(limits) = &file_config.limits {
        if let Some(max) = limits.max_urls_per_batch {
            config.max_urls_per_batch = max;
        }
    }

    if let Some(jobs) = &file_config.jobs {
        if let Some(dir) = &jobs.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(history) = &jobs.history_file {
            config.history_file = Some(history.clone());
        }
        if let Some(ttl) = jobs.job_ttl {
            config.job_ttl = Duration::from_secs(ttl);
        }
        if let Some(max_jobs) = jobs.max_jobs {
            config.max_jobs = max_jobs;
        }
    }

    if let Some(server) = &file_config.server {
        if let Some(port) = server.port {
            config.port = port;
        }
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &ConfigArgs) {
    if let Some(timeout) = args.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }

    if let Some(timeout) = args.contact_page_timeout {
        config.contact_page_timeout = Duration::from_secs(timeout);
    }

    if let Some(ref agent) = args.user_agent {
        config.user_agent = agent.clone();
    }

    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    if let Some(max) = args.max_urls_per_batch {
        config.max_urls_per_batch = max;
    }

    if let Some(pages) = args.max_contact_pages {
        config.max_contact_pages = Some(pages);
    }

    if let Some(fetcher) = args.fetcher {
        config.fetcher = fetcher;
    }

    if let Some(ref dir) = args.results_dir {
        config.results_dir = dir.clone();
    }

    if let Some(ref history) = args.history_file {
        config.history_file = Some(history.clone());
    }

    if let Some(ttl) = args.job_ttl {
        config.job_ttl = Duration::from_secs(ttl);
    }

    if let Some(max_jobs) = args.max_jobs {
        config.max_jobs = max_jobs;
    }
}

fn validate_config(config: &mut Config) -> anyhow::Result<()> {
    if config.workers == 0 {
        config.workers = 1;
        tracing::warn!("Workers was set to 0. Setting to 1.");
    }

    if config.max_urls_per_batch == 0 {
        anyhow::bail!("max_urls_per_batch must be at least 1");
    }

    if config.max_jobs == 0 {
        config.max_jobs = 1;
        tracing::warn!("max_jobs was set to 0. Setting to 1.");
    }

    if config.request_timeout.is_zero() || config.contact_page_timeout.is_zero() {
        anyhow::bail!("Request timeouts must be greater than zero");
    }

    if config.user_agent.trim().is_empty() {
        anyhow::bail!("User agent must not be empty");
    }

    Ok(())
}

/// Builds the configuration: defaults, then a TOML file, then CLI/env overrides.
pub fn build_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        let file_config = load_config_file(file_path)?;
        apply_file_config(&mut config, &file_config);
    } else {
        for path in ["./contact-harvester.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {}", path, e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut config, args);

    validate_config(&mut config)?;

    tracing::debug!("Final configuration: {:?}", config);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.contact_page_timeout, Duration::from_secs(15));
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_urls_per_batch, 100);
        assert_eq!(config.contact_page_limit(), 1);
    }

    #[test]
    fn test_browser_visits_three_contact_pages_by_default() {
        let config = Config {
            fetcher: FetcherKind::Browser,
            ..Config::default()
        };
        assert_eq!(config.contact_page_limit(), 3);

        let config = Config {
            fetcher: FetcherKind::Browser,
            max_contact_pages: Some(2),
            ..Config::default()
        };
        assert_eq!(config.contact_page_limit(), 2);
    }

    #[test]
    fn test_file_then_cli_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[network]
request_timeout = 12
user_agent = "harvester-test"

[scraping]
fetcher = "browser"
workers = 3

[limits]
max_urls_per_batch = 50

[jobs]
job_ttl = 60
"#
        )
        .unwrap();

        let args = ConfigArgs {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            workers: Some(9),
            ..ConfigArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.user_agent, "harvester-test");
        assert_eq!(config.fetcher, FetcherKind::Browser);
        assert_eq!(config.workers, 9);
        assert_eq!(config.max_urls_per_batch, 50);
        assert_eq!(config.job_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_validation_clamps_and_rejects() {
        let mut config = Config {
            workers: 0,
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.workers, 1);

        let mut config = Config {
            max_urls_per_batch: 0,
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network\nrequest_timeout = ").unwrap();
        let args = ConfigArgs {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            ..ConfigArgs::default()
        };
        assert!(build_config(&args).is_err());
    }
}
