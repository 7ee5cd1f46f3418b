use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::SinkError;

/// Receives every indexable page the crawler retrieves.
///
/// Called concurrently from all workers. The crawler logs a returned error and moves on;
/// what to keep and where is entirely up to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Handle the raw bytes of `url`; `last_modified` comes from the response headers
    async fn handle_content(
        &self,
        url: &Url,
        last_modified: Option<DateTime<Utc>>,
        content: &[u8],
    ) -> Result<(), SinkError>;
}
