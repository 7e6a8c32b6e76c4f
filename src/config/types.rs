use crate::url::ExclusionRules;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Browser-like user agent used when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_MAX_DEPTH: u32 = 3;
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_RATE_LIMIT: f64 = 0.5;
pub const DEFAULT_TIMEOUT: u64 = 5;
pub const DEFAULT_BUFFER_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Settings file structure
///
/// Every field is optional so a file can carry only what it wants to pin;
/// command line flags are layered on top before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub crawl: CrawlSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// `[crawl]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlSettings {
    /// Target URL (must include http:// or https://)
    pub url: Option<String>,

    #[serde(rename = "max-depth")]
    pub max_depth: Option<u32>,

    /// Concurrent fetches in flight
    pub workers: Option<usize>,

    /// Delay before each request, in seconds
    #[serde(rename = "rate-limit")]
    pub rate_limit: Option<f64>,

    /// Per-request timeout, in seconds
    pub timeout: Option<u64>,

    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    /// HTTP(S) or SOCKS5 proxy URL
    pub proxy: Option<String>,

    #[serde(rename = "exclude-paths")]
    pub exclude_paths: Option<String>,

    #[serde(rename = "exclude-subdomains")]
    pub exclude_subdomains: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// `[storage]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Records buffered before a flush is due
    #[serde(rename = "buffer-size")]
    pub buffer_size: Option<usize>,

    /// Directory holding recovery mirror files
    #[serde(rename = "buffer-dir")]
    pub buffer_dir: Option<String>,

    #[serde(rename = "flush-interval-ms")]
    pub flush_interval_ms: Option<u64>,
}

/// `[output]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSettings {
    /// Prefix for result files
    pub prefix: Option<String>,

    /// Write JSON instead of plain text lists
    #[serde(default)]
    pub json: bool,
}

/// Immutable per-session crawl configuration
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    /// Normalized base URL the crawl starts from
    pub base_url: Url,

    /// Maximum link depth; the base URL is depth 0
    pub max_depth: u32,

    /// Maximum fetches in flight at once
    pub workers: usize,

    /// Delay each worker sleeps before its request
    pub delay: Duration,

    /// Per-request timeout enforced by the HTTP client
    pub timeout: Duration,

    pub user_agent: String,

    pub proxy: Option<String>,

    pub exclusions: ExclusionRules,

    /// Custom headers, applied over the default request headers
    pub headers: BTreeMap<String, String>,
}

impl CrawlTarget {
    /// Creates a target with the default limits
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            delay: Duration::from_secs_f64(DEFAULT_RATE_LIMIT),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            exclusions: ExclusionRules::default(),
            headers: BTreeMap::new(),
        }
    }

    pub fn exclude_paths(&self) -> Option<&Regex> {
        self.exclusions.paths.as_ref()
    }

    pub fn exclude_subdomains(&self) -> Option<&Regex> {
        self.exclusions.subdomains.as_ref()
    }
}

/// Storage and buffering options resolved from settings
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub database_path: PathBuf,
    pub buffer_size: usize,
    pub buffer_dir: PathBuf,
    pub flush_interval: Duration,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("subtrace.db"),
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_dir: PathBuf::from("results"),
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}
