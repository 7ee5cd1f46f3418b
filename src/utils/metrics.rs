use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Crawl statistics shared by all workers
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: Arc<Mutex<Metrics>>,
}

/// Snapshot of what a crawl has done so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    /// When the crawl started
    pub start_time: DateTime<Utc>,

    /// When the snapshot was taken
    pub end_time: DateTime<Utc>,

    /// Addresses admitted into the frontier
    pub urls_queued: usize,

    /// Addresses rejected by the pattern, scheme or robots gates
    pub urls_skipped: usize,

    /// HTML pages fetched and analyzed
    pub pages_fetched: usize,

    /// Pages handed to the content sink
    pub pages_stored: usize,

    /// Fetches that were abandoned
    pub pages_failed: usize,

    /// Body bytes downloaded
    pub bytes_downloaded: usize,

    /// HTTP status code counts
    pub status_codes: HashMap<u16, usize>,
}

impl Default for Metrics {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            urls_queued: 0,
            urls_skipped: 0,
            pages_fetched: 0,
            pages_stored: 0,
            pages_failed: 0,
            bytes_downloaded: 0,
            status_codes: HashMap::new(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(Metrics::default())),
        }
    }

    pub async fn record_queued(&self) {
        self.metrics.lock().await.urls_queued += 1;
    }

    pub async fn record_skipped(&self) {
        self.metrics.lock().await.urls_skipped += 1;
    }

    /// Record a response, successful or not
    pub async fn record_response(&self, status_code: u16) {
        *self.metrics.lock().await.status_codes.entry(status_code).or_default() += 1;
    }

    pub async fn record_fetched(&self, bytes: usize) {
        let mut metrics = self.metrics.lock().await;
        metrics.pages_fetched += 1;
        metrics.bytes_downloaded += bytes;
    }

    pub async fn record_failed(&self) {
        self.metrics.lock().await.pages_failed += 1;
    }

    pub async fn record_stored(&self) {
        self.metrics.lock().await.pages_stored += 1;
    }

    /// Get all metrics, stamped with the current time
    pub async fn get_metrics(&self) -> Metrics {
        let mut snapshot = self.metrics.lock().await.clone();
        snapshot.end_time = Utc::now();
        snapshot
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
