pub mod commands;
pub mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use url::Url;

use crate::utils::init_logging;
use config::CrawlerConfig;

/// Crawl a site politely, mirroring every indexable page to disk
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to start crawling from
    #[arg(required = true)]
    pub url: Url,

    /// Honour robots.txt and robots META tags
    #[arg(short = 'r', long, value_name = "BOOL")]
    pub follow_robots: Option<bool>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Follow links that leave the starting host
    #[arg(short, long, value_name = "BOOL")]
    pub follow_other_domains: Option<bool>,

    /// Connect timeout in milliseconds
    #[arg(short = 'c', long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Whole-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub read_timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(short, long)]
    pub user_agent: Option<String>,

    /// Only fetch addresses matching this glob
    #[arg(short, long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Log every accepted and rejected address
    #[arg(short, long, value_name = "BOOL")]
    pub verbose: Option<bool>,

    /// Directory pages are saved under
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Abandon pages whose body is larger than this
    #[arg(long, value_name = "BYTES")]
    pub max_body_bytes: Option<usize>,

    /// YAML configuration file; defaults to the per-user configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Overwrite configuration values with the flags that were given
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        let crawler = &mut config.crawler;

        if let Some(follow_robots) = self.follow_robots {
            crawler.follow_robots = follow_robots;
        }
        if let Some(threads) = self.threads {
            crawler.threads = threads;
        }
        if let Some(follow_other_domains) = self.follow_other_domains {
            crawler.follow_other_domains = follow_other_domains;
        }
        if let Some(timeout) = self.timeout {
            crawler.timeout_ms = timeout;
        }
        if self.read_timeout.is_some() {
            crawler.read_timeout_ms = self.read_timeout;
        }
        if self.user_agent.is_some() {
            crawler.user_agent = self.user_agent.clone();
        }
        if self.pattern.is_some() {
            crawler.pattern = self.pattern.clone();
        }
        if let Some(verbose) = self.verbose {
            crawler.verbose = verbose;
        }
        if self.max_body_bytes.is_some() {
            crawler.max_body_bytes = self.max_body_bytes;
        }
        if let Some(output_dir) = &self.output_dir {
            config.storage.output_dir = output_dir.clone();
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Resolve the configuration, set up logging and run the crawl
pub async fn process_command(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CrawlerConfig::load_from_file(path)?,
        None => CrawlerConfig::load_default().context("Failed to load default configuration")?,
    };
    cli.apply_to(&mut config);

    init_logging(config.crawler.verbose, cli.log_file.clone())
        .context("Failed to initialize logging")?;

    info!("Starting crawl on {}", cli.url);
    commands::crawl(cli.url, config).await
}
