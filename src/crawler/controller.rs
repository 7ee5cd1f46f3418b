use anyhow::{Context, Result};
use std::future::{self, Future};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use super::analyzer;
use super::fetcher::Fetcher;
use super::frontier::Frontier;
use super::robots::RobotsCache;
use super::scheduler::Scheduler;
use crate::cli::config::CrawlerSettings;
use crate::error::FetchError;
use crate::storage::ContentSink;
use crate::utils::{Metrics, MetricsCollector};

/// Runs one crawl session: a fixed pool of workers sharing a frontier, supervised until the
/// pool goes idle.
pub struct Crawler {
    settings: Arc<CrawlerSettings>,
    start_url: Url,
    frontier: Frontier,
    robots: RobotsCache,
    fetcher: Fetcher,
    sink: Arc<dyn ContentSink>,
    metrics: MetricsCollector,
}

impl Crawler {
    /// Create a crawler for `start_url`. The settings are frozen for the lifetime of the crawl.
    pub fn new(start_url: Url, settings: CrawlerSettings, sink: Arc<dyn ContentSink>) -> Result<Self> {
        settings.validate().context("Invalid crawler settings")?;

        let pattern = settings.compiled_pattern()?;
        let scheduler = Scheduler::new(&start_url, settings.follow_other_domains, pattern);
        let frontier = Frontier::new(scheduler, settings.threads);
        let fetcher = Fetcher::new(&settings).context("Failed to create HTTP client")?;

        Ok(Self {
            settings: Arc::new(settings),
            start_url,
            frontier,
            robots: RobotsCache::new(),
            fetcher,
            sink,
            metrics: MetricsCollector::new(),
        })
    }

    /// Crawl until every worker is waiting on an empty frontier, then stop the workers, wait
    /// for them to exit and return the crawl statistics.
    pub async fn run(self) -> Result<Metrics> {
        self.run_until(future::pending()).await
    }

    /// Like [`Crawler::run`], but also stops early once `shutdown` completes. Pages already
    /// being fetched are finished; nothing new is dequeued.
    pub async fn run_until<F>(self, shutdown: F) -> Result<Metrics>
    where
        F: Future<Output = ()>,
    {
        let crawler = Arc::new(self);
        let threads = crawler.settings.threads;
        let poll_interval = crawler.settings.poll_interval();

        crawler.enqueue(&crawler.start_url).await;

        info!("Starting {} working threads", threads);
        let workers: Vec<JoinHandle<()>> = (0..threads)
            .map(|id| {
                let crawler = crawler.clone();
                tokio::spawn(async move { crawler.work(id).await })
            })
            .collect();

        let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if crawler.frontier.is_quiescent() {
                        info!("Stopping working threads");
                        break;
                    }
                }
                _ = &mut shutdown => {
                    warn!("Interrupted, stopping working threads");
                    break;
                }
            }
        }

        crawler.frontier.stop();
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }

        let metrics = crawler.metrics.get_metrics().await;
        info!(
            "Crawl finished: {} page(s) fetched, {} stored, {} failed, {} skipped",
            metrics.pages_fetched, metrics.pages_stored, metrics.pages_failed, metrics.urls_skipped
        );

        Ok(metrics)
    }

    async fn work(&self, id: usize) {
        debug!("Worker {} started", id);
        while let Some(url) = self.frontier.next().await {
            self.process(url).await;
        }
        debug!("Worker {} stopped", id);
    }

    async fn enqueue(&self, url: &Url) {
        if self.frontier.enqueue(url) {
            self.metrics.record_queued().await;
        }
    }

    /// Gate, fetch and analyze one address, feeding links back into the frontier
    async fn process(&self, url: Url) {
        if let Err(reason) = self.frontier.scheduler().check_fetchable(&url) {
            debug!("Refusing to load URL {} - {}", url, reason);
            self.metrics.record_skipped().await;
            return;
        }

        let obey_robots = self.settings.follow_robots;
        if obey_robots && !self.robots.is_allowed(&url, &self.fetcher).await {
            debug!("Refusing to load URL {} - not allowed in robots.txt", url);
            self.metrics.record_skipped().await;
            return;
        }

        let page = match self.fetcher.fetch_page(&url).await {
            Ok(page) => page,
            Err(FetchError::Redirect { status, target }) => {
                // The target is gated like any other link before it is fetched
                self.metrics.record_response(status).await;
                debug!("URL {} redirects to {}", url, target);
                self.enqueue(&target).await;
                return;
            }
            Err(e) => {
                self.record_failure(&url, e).await;
                return;
            }
        };
        self.metrics.record_response(page.status_code).await;
        self.metrics.record_fetched(page.content.len()).await;

        let last_modified = page.last_modified;
        let analysis = analyzer::analyze(page.content, &page.url);

        let links = if obey_robots {
            analysis.followable_links()
        } else {
            analysis.links.as_slice()
        };
        for link in links {
            self.enqueue(link).await;
        }
        if !analysis.follow && obey_robots {
            debug!("Not following links from {} - robots META tag says nofollow", url);
        }

        if analysis.index || !obey_robots {
            match self.sink.handle_content(&url, last_modified, &analysis.content).await {
                Ok(()) => self.metrics.record_stored().await,
                Err(e) => warn!("Failed to store content of {}: {}", url, e),
            }
        } else {
            debug!("Not indexing {} - robots META tag says noindex", url);
        }
    }

    async fn record_failure(&self, url: &Url, error: FetchError) {
        self.metrics.record_failed().await;

        match error {
            FetchError::NotFound => {
                self.metrics.record_response(404).await;
                debug!("Resource doesn't exist: {}", url);
            }
            FetchError::Status(code) => {
                self.metrics.record_response(code).await;
                debug!("Stopping processing URL {} - HTTP {}", url, code);
            }
            FetchError::NotHtml(content_type) => {
                debug!(
                    "Stopping processing URL {} - unknown content type ({})",
                    url,
                    content_type.as_deref().unwrap_or("none")
                );
            }
            other => warn!("Failed to fetch {}: {}", url, other),
        }
    }
}
