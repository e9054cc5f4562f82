use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_ROOT_URL: &str = "https://web-scraping.dev/";
const DEFAULT_LIMIT: usize = 50;
const DEFAULT_OUTPUT: &str = "results.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid root URL '{url}': {source}")]
    InvalidRootUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("root URL has no host: {0}")]
    MissingHost(String),

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

impl ConfigError {
    /// True when the root URL itself is unusable, as opposed to a bad file or setting
    pub fn is_invalid_root(&self) -> bool {
        matches!(self, Self::InvalidRootUrl { .. } | Self::MissingHost(_))
    }
}

/// What relative hrefs are joined onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkBase {
    /// The URL of the page the link was found on
    #[default]
    Page,
    /// The crawl's root URL, whatever page the link was found on
    Root,
}

/// Settings for one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// URL to start crawling from
    pub root_url: String,

    /// Maximum number of successfully fetched and parsed pages
    pub limit: usize,

    /// Where the JSON snapshot is written
    pub output: String,

    /// Log every URL as it is dequeued
    pub verbose: bool,

    /// Number of fetches allowed in flight at once
    pub workers: usize,

    pub link_base: LinkBase,

    /// Connect and total request timeout, in seconds
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Bodies larger than this are treated as a failed fetch
    pub max_response_bytes: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            limit: DEFAULT_LIMIT,
            output: DEFAULT_OUTPUT.to_string(),
            verbose: false,
            workers: default_workers(),
            link_base: LinkBase::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; sitecrawl/{})",
        env!("CARGO_PKG_VERSION")
    )
}

impl CrawlConfig {
    /// Configuration with defaults for everything but the root URL
    pub fn new(root_url: &str) -> Self {
        Self {
            root_url: root_url.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the settings a crawl cannot start without, returning the parsed root
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        let root = Url::parse(&self.root_url).map_err(|source| ConfigError::InvalidRootUrl {
            url: self.root_url.clone(),
            source,
        })?;
        if root.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingHost(self.root_url.clone()));
        }
        Ok(root)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
