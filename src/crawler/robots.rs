//! robots.txt fetching, caching and matching.
//!
//! Rules are fetched once per origin on first reference and kept for the whole crawl.
//! Only `User-agent: *` groups and their `Disallow:` prefixes are honoured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use super::fetcher::Fetcher;

type Rules = Arc<Vec<String>>;

/// Per-origin cache of disallowed path prefixes.
///
/// Keyed by origin (scheme, host and port), not bare host: each origin has its own robots.txt.
/// Each origin owns its own `OnceCell`, so populating one origin never waits on another,
/// while concurrent lookups for the same origin share a single robots.txt fetch.
#[derive(Debug, Default)]
pub struct RobotsCache {
    origins: Mutex<HashMap<String, Arc<OnceCell<Rules>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `url` may be fetched under its origin's robots.txt
    pub async fn is_allowed(&self, url: &Url, fetcher: &Fetcher) -> bool {
        let rules = self.rules_for(url, fetcher).await;
        let path = url.path();

        match rules.iter().find(|prefix| path.starts_with(prefix.as_str())) {
            Some(prefix) => {
                debug!(path = %path, prefix = %prefix, "robots.txt disallows path");
                false
            }
            None => true,
        }
    }

    /// Disallowed prefixes for `url`'s origin, fetching them on first use
    pub async fn rules_for(&self, url: &Url, fetcher: &Fetcher) -> Rules {
        let key = url.origin().ascii_serialization();
        let cell = {
            let mut origins = self.origins.lock().unwrap_or_else(PoisonError::into_inner);
            origins.entry(key).or_default().clone()
        };

        cell.get_or_init(|| fetch_rules(url, fetcher)).await.clone()
    }

    /// Number of origins whose rules have been resolved or are being resolved
    #[cfg(test)]
    fn origin_count(&self) -> usize {
        self.origins.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

async fn fetch_rules(url: &Url, fetcher: &Fetcher) -> Rules {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(_) => return Rules::default(),
    };

    match fetcher.fetch_text(&robots_url).await {
        Ok(body) => {
            let rules = parse_disallow_rules(&body);
            debug!("Loaded {} disallow rule(s) from {}", rules.len(), robots_url);
            Arc::new(rules)
        }
        Err(e) => {
            // Unreachable or missing robots.txt leaves the origin unrestricted for the session
            debug!("No usable robots.txt at {}: {}", robots_url, e);
            Rules::default()
        }
    }
}

/// Parse the `Disallow:` prefixes that apply to every robot.
///
/// Consecutive `User-agent:` lines form one group; the group applies when one of them is `*`.
/// Lines before the first `User-agent:` apply to everyone.
pub fn parse_disallow_rules(body: &str) -> Vec<String> {
    let mut applies = true;
    let mut previous_was_agent = false;
    let mut disallowed = Vec::new();

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim();
        let value = value.trim();

        if field.eq_ignore_ascii_case("user-agent") {
            let wildcard = value == "*";
            applies = if previous_was_agent { applies || wildcard } else { wildcard };
            previous_was_agent = true;
            continue;
        }
        previous_was_agent = false;

        // An empty Disallow allows everything
        if applies && field.eq_ignore_ascii_case("disallow") && !value.is_empty() {
            disallowed.push(value.to_string());
        }
    }

    disallowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::CrawlerSettings;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(&CrawlerSettings::default()).unwrap()
    }

    async fn robots_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn url(server: &MockServer, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), path)).unwrap()
    }

    #[test]
    fn test_parse_wildcard_group() {
        let rules = parse_disallow_rules("User-agent: *\nDisallow: /private\nDisallow: /tmp/\n");
        assert_eq!(rules, vec!["/private", "/tmp/"]);
    }

    #[test]
    fn test_parse_skips_other_agents() {
        let body = "\
User-agent: googlebot
Disallow: /only-google

User-agent: *
Disallow: /everyone

User-agent: bingbot
Disallow: /only-bing
";
        assert_eq!(parse_disallow_rules(body), vec!["/everyone"]);
    }

    #[test]
    fn test_parse_grouped_agents_and_comments() {
        let body = "\
# maintenance
user-agent: somebot
User-Agent: *   # everyone else too
disallow: /admin # staff only
Disallow:
";
        assert_eq!(parse_disallow_rules(body), vec!["/admin"]);
    }

    #[test]
    fn test_parse_rules_before_any_agent_apply() {
        assert_eq!(parse_disallow_rules("Disallow: /cgi-bin\n"), vec!["/cgi-bin"]);
        assert!(parse_disallow_rules("").is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_prefix() {
        let server = robots_server("User-agent: *\nDisallow: /private\n").await;
        let cache = RobotsCache::new();
        let fetcher = fetcher();

        assert!(!cache.is_allowed(&url(&server, "/private/x"), &fetcher).await);
        assert!(!cache.is_allowed(&url(&server, "/private"), &fetcher).await);
        assert!(cache.is_allowed(&url(&server, "/public"), &fetcher).await);
        assert!(cache.is_allowed(&url(&server, "/"), &fetcher).await);
        assert_eq!(cache.origin_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new();
        let fetcher = fetcher();
        assert!(cache.is_allowed(&url(&server, "/anything"), &fetcher).await);
        assert!(cache.is_allowed(&url(&server, "/private/x"), &fetcher).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unrestricted() {
        let cache = RobotsCache::new();
        let fetcher = fetcher();
        let unreachable = Url::parse("http://127.0.0.1:9/private/x").unwrap();

        assert!(cache.is_allowed(&unreachable, &fetcher).await);
        assert!(cache.rules_for(&unreachable, &fetcher).await.is_empty());
        assert_eq!(cache.origin_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        // `expect(1)` is verified when the server drops
        let server = robots_server("User-agent: *\nDisallow: /private\n").await;
        let cache = Arc::new(RobotsCache::new());
        let fetcher = fetcher();

        let checks = (0..8).map(|i| {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            let target = url(&server, &format!("/page{i}"));
            tokio::spawn(async move { cache.is_allowed(&target, &fetcher).await })
        });

        for allowed in futures::future::join_all(checks).await {
            assert!(allowed.unwrap());
        }
    }

    #[tokio::test]
    async fn test_rules_kept_per_origin() {
        let strict = robots_server("User-agent: *\nDisallow: /\n").await;
        let open = robots_server("User-agent: *\nDisallow: /private\n").await;
        let cache = RobotsCache::new();
        let fetcher = fetcher();

        // both servers live on 127.0.0.1, only the port differs
        assert!(!cache.is_allowed(&url(&strict, "/page"), &fetcher).await);
        assert!(cache.is_allowed(&url(&open, "/page"), &fetcher).await);
        assert!(!cache.is_allowed(&url(&strict, "/other"), &fetcher).await);
        assert_eq!(cache.origin_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_origin_does_not_block_others() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /\n")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&slow)
            .await;
        let fast = robots_server("User-agent: *\nDisallow: /private\n").await;

        let cache = Arc::new(RobotsCache::new());
        let fetcher = fetcher();

        let slow_check = {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            let target = url(&slow, "/page");
            tokio::spawn(async move { cache.is_allowed(&target, &fetcher).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = tokio::time::Instant::now();
        assert!(cache.is_allowed(&url(&fast, "/public"), &fetcher).await);
        assert!(started.elapsed() < Duration::from_secs(2));

        assert!(!slow_check.await.unwrap());
    }
}
