use std::fmt;

use url::Url;

use crate::utils::GlobPattern;

/// Schemes the fetcher knows how to retrieve
const FETCHABLE_SCHEMES: [&str; 2] = ["http", "https"];

/// Why a dequeued address is not fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The address doesn't match the configured glob
    PatternMismatch(String),

    /// The scheme is not one the fetcher supports
    UnsupportedScheme(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::PatternMismatch(pattern) => write!(f, "it doesn't match pattern '{pattern}'"),
            Rejection::UnsupportedScheme(scheme) => write!(f, "protocol '{scheme}' is not HTTP"),
        }
    }
}

/// Decides which addresses belong to the crawl and which may be fetched
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Host of the seed address; `None` when other domains may be followed
    home_host: Option<String>,

    /// Glob an address must match to be fetched
    pattern: Option<GlobPattern>,
}

impl Scheduler {
    pub fn new(start_url: &Url, follow_other_domains: bool, pattern: Option<GlobPattern>) -> Self {
        let home_host = if follow_other_domains {
            None
        } else {
            Some(start_url.host_str().unwrap_or_default().to_string())
        };

        Self { home_host, pattern }
    }

    /// Whether `url` may enter the frontier at all
    pub fn in_scope(&self, url: &Url) -> bool {
        match &self.home_host {
            Some(home) => url.host_str() == Some(home.as_str()),
            None => true,
        }
    }

    /// Gates applied to a dequeued address before any network traffic
    pub fn check_fetchable(&self, url: &Url) -> Result<(), Rejection> {
        if let Some(pattern) = &self.pattern {
            if !pattern.matches(url.as_str()) {
                return Err(Rejection::PatternMismatch(pattern.as_str().to_string()));
            }
        }

        if !FETCHABLE_SCHEMES.contains(&url.scheme()) {
            return Err(Rejection::UnsupportedScheme(url.scheme().to_string()));
        }

        Ok(())
    }
}

/// Canonical form of an address: the same URL without its fragment
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}
