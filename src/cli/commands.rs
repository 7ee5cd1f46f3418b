use anyhow::{Context, Result};
use std::future;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cli::config::CrawlerConfig;
use crate::crawler::Crawler;
use crate::storage::FileSink;
use crate::utils::Metrics;

/// Crawl from `url`, mirroring pages under the configured output directory
pub async fn crawl(url: Url, config: CrawlerConfig) -> Result<()> {
    config
        .crawler
        .validate()
        .context("Invalid crawler configuration")?;

    let sink = Arc::new(FileSink::new(&config.storage.output_dir));
    info!("Saving pages under {}", sink.root().display());

    let crawler = Crawler::new(url, config.crawler, sink)?;
    let metrics = crawler.run_until(interrupted()).await?;

    log_summary(&metrics);
    Ok(())
}

/// Completes on Ctrl-C; never completes if the signal can't be watched
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Can't listen for Ctrl-C: {}", e);
        future::pending::<()>().await;
    }
}

fn log_summary(metrics: &Metrics) {
    let elapsed = metrics.end_time.signed_duration_since(metrics.start_time);

    info!("Addresses queued: {}", metrics.urls_queued);
    info!("Pages fetched: {} ({} bytes)", metrics.pages_fetched, metrics.bytes_downloaded);
    info!("Pages stored: {}", metrics.pages_stored);
    info!("Pages failed: {}", metrics.pages_failed);
    info!("Addresses skipped: {}", metrics.urls_skipped);

    let mut codes: Vec<_> = metrics.status_codes.iter().collect();
    codes.sort();
    for (code, count) in codes {
        info!("HTTP {}: {}", code, count);
    }
    info!("Crawl took {} ms", elapsed.num_milliseconds());
}
