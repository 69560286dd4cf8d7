use serde::Deserialize;

/// Main configuration structure for Sitesearch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URL where crawling starts; only links below it are followed
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Delimited regular expressions (e.g. `#date\=#i`) excluding matching links
    #[serde(rename = "filter-regex", default)]
    pub filter_regex: Vec<String>,

    /// Identifiers of the indexers to register, in order
    #[serde(default)]
    pub indexer: Vec<String>,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Maximum number of concurrent page fetches
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: u32,

    /// Remove documents that a completed run no longer reached
    #[serde(rename = "prune-stale", default = "default_prune_stale")]
    pub prune_stale: bool,
}

/// Search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Number of results per search page
    #[serde(rename = "result-page-size", default = "default_result_page_size")]
    pub result_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_page_size: default_result_page_size(),
        }
    }
}

/// Recipients of the crawl statistics report
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsConfig {
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite index database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown crawl report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

pub(crate) fn default_request_timeout() -> u64 {
    30
}

pub(crate) fn default_max_concurrent_fetches() -> u32 {
    1
}

pub(crate) fn default_prune_stale() -> bool {
    true
}

pub(crate) fn default_result_page_size() -> u32 {
    25
}
