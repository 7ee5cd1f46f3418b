use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::cli::config::CrawlerSettings;
use crate::error::FetchError;

/// Redirect hops followed while looking for robots.txt
const MAX_TEXT_REDIRECTS: usize = 5;

/// An HTML page that was retrieved successfully
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Address the content was served from
    pub url: Url,

    pub status_code: u16,

    /// `Last-Modified` header, when present and well-formed
    pub last_modified: Option<DateTime<Utc>>,

    /// Raw body bytes
    pub content: Vec<u8>,
}

/// HTTP client shared by the workers and the robots cache
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: Option<usize>,
}

impl Fetcher {
    /// Build a client with the configured timeouts and user agent.
    ///
    /// Redirects are never followed automatically: page fetches report them as
    /// [`FetchError::Redirect`] so the target goes through the same gates as any link.
    pub fn new(settings: &CrawlerSettings) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .redirect(Policy::none());

        if let Some(timeout) = settings.read_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    /// Fetch an HTML page. Anything that is not a successful `text/html` response is an error.
    pub async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.get(url).await?;
        let status_code = response.status().as_u16();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let is_html = content_type
            .as_deref()
            .map_or(false, |ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"));
        if !is_html {
            return Err(FetchError::NotHtml(content_type));
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);

        let url = response.url().clone();
        let content = read_body(response, self.max_body_bytes).await?;

        debug!("Fetched {} ({} bytes)", url, content.len());

        Ok(FetchedPage {
            url,
            status_code,
            last_modified,
            content,
        })
    }

    /// Fetch a plain text resource such as robots.txt, following a few redirects
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let mut url = url.clone();
        let mut hops = 0;
        loop {
            match self.get(&url).await {
                Ok(response) => return Ok(response.text().await?),
                Err(FetchError::Redirect { target, .. }) if hops < MAX_TEXT_REDIRECTS => {
                    debug!("Following redirect from {} to {}", url, target);
                    url = target;
                    hops += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let target = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| url.join(location.trim()).ok());
            if let Some(target) = target {
                return Err(FetchError::Redirect {
                    status: status.as_u16(),
                    target,
                });
            }
        }
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

async fn read_body(mut response: Response, limit: Option<usize>) -> Result<Vec<u8>, FetchError> {
    let Some(limit) = limit else {
        return Ok(response.bytes().await?.to_vec());
    };

    if response.content_length().map_or(false, |len| len > limit as u64) {
        return Err(FetchError::BodyTooLarge { limit });
    }

    let mut content = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if content.len() + chunk.len() > limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
        content.extend_from_slice(&chunk);
    }

    Ok(content)
}

/// Parse an HTTP-date such as `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
