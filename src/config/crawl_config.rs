use crate::config::types::{
    default_max_concurrent_fetches, default_prune_stale, default_request_timeout,
    default_result_page_size, Config,
};
use crate::config::validation::validate_base_url;
use crate::crawler::CRAWLER_USER_AGENT;
use crate::url::{FilterPattern, UrlFilter};
use crate::ConfigError;
use std::time::Duration;

/// Immutable settings for one crawl run
///
/// Built once from a loaded [`Config`] (or programmatically) and shared by
/// reference with the coordinator, fetcher and filter. Filter patterns are
/// compiled here so malformed expressions surface before crawling starts.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    filter: UrlFilter,
    indexers: Vec<String>,
    result_page_size: usize,
    user_agent: String,
    request_timeout: Duration,
    max_concurrent_fetches: usize,
    prune_stale: bool,
}

impl CrawlConfig {
    /// Creates a configuration for `base_url` with every other setting at its default
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        validate_base_url(base_url)?;
        let filter = UrlFilter::new(base_url.trim(), Vec::new())?;

        Ok(Self {
            filter,
            indexers: Vec::new(),
            result_page_size: default_result_page_size() as usize,
            user_agent: CRAWLER_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(default_request_timeout()),
            max_concurrent_fetches: default_max_concurrent_fetches() as usize,
            prune_stale: default_prune_stale(),
        })
    }

    /// Builds the run configuration from a loaded configuration file
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;
        Ok(Self::new(&crawler.base_url)?
            .with_filters(&crawler.filter_regex)?
            .with_indexers(crawler.indexer.clone())
            .with_result_page_size(config.search.result_page_size as usize)?
            .with_request_timeout(Duration::from_secs(crawler.request_timeout))
            .with_max_concurrent_fetches(crawler.max_concurrent_fetches as usize)
            .with_prune_stale(crawler.prune_stale))
    }

    /// Replaces the filter expressions, compiling each one
    pub fn with_filters<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ConfigError> {
        let compiled = patterns
            .iter()
            .map(|p| FilterPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.filter = UrlFilter::new(self.filter.base_url().as_str(), compiled)?;
        Ok(self)
    }

    pub fn with_indexers(mut self, indexers: Vec<String>) -> Self {
        self.indexers = indexers;
        self
    }

    pub fn with_result_page_size(mut self, page_size: usize) -> Result<Self, ConfigError> {
        if page_size == 0 {
            return Err(ConfigError::Validation(
                "result_page_size must be >= 1, got 0".to_string(),
            ));
        }
        self.result_page_size = page_size;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the worker pool size (clamped to at least one)
    pub fn with_max_concurrent_fetches(mut self, workers: usize) -> Self {
        self.max_concurrent_fetches = workers.max(1);
        self
    }

    pub fn with_prune_stale(mut self, prune: bool) -> Self {
        self.prune_stale = prune;
        self
    }

    /// The normalized base URL
    pub fn base_url(&self) -> &url::Url {
        self.filter.base_url()
    }

    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    pub fn indexers(&self) -> &[String] {
        &self.indexers
    }

    pub fn result_page_size(&self) -> usize {
        self.result_page_size
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    pub fn prune_stale(&self) -> bool {
        self.prune_stale
    }
}
