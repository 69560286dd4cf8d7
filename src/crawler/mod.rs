//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a fixed user agent and timeout
//! - HTML parsing and link extraction
//! - The frontier queue and visited set
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{Coordinator, MAX_CONSECUTIVE_STORE_FAILURES};
pub use fetcher::{build_http_client, FetchError, FetchResult, HttpFetcher, PageFetcher, CRAWLER_USER_AGENT};
pub use frontier::{CrawlTask, Frontier, TaskOrigin};
pub use parser::{decode_body, extract_links, parse_body, parse_html, ParsedPage};

use crate::config::{Config, CrawlConfig};
use crate::indexer::IndexerRegistry;
use crate::output::CrawlStats;
use crate::storage::SqliteStorage;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the immutable run configuration
/// 2. Open the index database
/// 3. Build the HTTP client and the configured indexers
/// 4. Crawl until the frontier is empty or `cancel` fires
///
/// # Arguments
///
/// * `config` - The loaded configuration file
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `cancel` - Stops the crawl after in-flight fetches complete
///
/// # Example
///
/// ```no_run
/// use sitesearch::config::load_config_with_hash;
/// use sitesearch::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let stats = run_crawl(&config, &hash, CancellationToken::new()).await?;
/// println!("{} pages indexed", stats.pages_indexed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> crate::Result<CrawlStats> {
    let crawl_config = CrawlConfig::from_config(config)?;

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(
        crawl_config.user_agent(),
        crawl_config.request_timeout(),
    )?);

    let indexers = IndexerRegistry::from_identifiers(
        crawl_config.indexers(),
        crawl_config.base_url(),
        Arc::clone(&fetcher),
    )?;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?
        .with_page_size(crawl_config.result_page_size());

    tracing::info!(
        "Crawling {} with {} filter(s), indexers: [{}], {} worker(s)",
        crawl_config.base_url(),
        crawl_config.filter().patterns().len(),
        indexers.names().join(", "),
        crawl_config.max_concurrent_fetches()
    );

    let mut coordinator = Coordinator::new(crawl_config, storage, fetcher, indexers)
        .with_cancellation(cancel)
        .with_config_hash(config_hash);

    coordinator.run().await
}
