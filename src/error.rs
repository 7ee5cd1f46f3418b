use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or validating the crawl configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("invalid address pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A glob that could not be turned into a regular expression
#[derive(Debug, Error)]
#[error("glob '{glob}' is not valid: {source}")]
pub struct PatternError {
    pub glob: String,
    #[source]
    pub source: regex::Error,
}

/// Reasons a single page fetch is abandoned
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("redirected ({status}) to {target}")]
    Redirect { status: u16, target: url::Url },

    #[error("resource doesn't exist")]
    NotFound,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("unsupported content type ({})", .0.as_deref().unwrap_or("none"))]
    NotHtml(Option<String>),

    #[error("body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Failures inside a content sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("address {0} has no host to store it under")]
    NoHost(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
