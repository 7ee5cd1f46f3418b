use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::utils::GlobPattern;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CrawlerConfig {
    pub crawler: CrawlerSettings,
    pub storage: StorageSettings,
}

/// Crawler-specific settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Number of concurrent workers
    pub threads: usize,

    /// Connect timeout in milliseconds
    pub timeout_ms: u64,

    /// Whole-request timeout in milliseconds; unbounded when absent
    pub read_timeout_ms: Option<u64>,

    pub follow_other_domains: bool,

    /// Honour robots.txt and the robots META tag
    pub follow_robots: bool,

    /// Value of the User-Agent header; reqwest sends none by default
    pub user_agent: Option<String>,

    /// Glob that an address must match to be fetched
    pub pattern: Option<String>,

    pub verbose: bool,

    /// How often the supervisor looks for an idle worker pool, in milliseconds
    pub poll_interval_ms: u64,

    /// Largest page body that will be buffered; unbounded when absent
    pub max_body_bytes: Option<usize>,
}

/// Storage settings for the default content sink
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory under which pages are mirrored as `host/path`
    pub output_dir: PathBuf,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            threads: 5,
            timeout_ms: 5000,
            read_timeout_ms: None,
            follow_other_domains: false,
            follow_robots: true,
            user_agent: None,
            pattern: None,
            verbose: false,
            poll_interval_ms: 1000,
            max_body_bytes: None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl CrawlerSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Compile the address pattern, if one is configured
    pub fn compiled_pattern(&self) -> Result<Option<GlobPattern>, ConfigError> {
        self.pattern
            .as_deref()
            .map(GlobPattern::new)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Reject settings the crawler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("read timeout"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        self.compiled_pattern()?;
        Ok(())
    }
}

impl CrawlerConfig {
    /// Path of the per-user default configuration, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "polite-crawler", "polite-crawler")
            .map(|dirs| dirs.config_dir().join("default.yaml"))
    }

    /// Load the per-user default configuration, falling back to built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}
