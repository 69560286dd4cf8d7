//! Sitesearch main entry point
//!
//! This is the command-line interface for the Sitesearch crawler and index.

use anyhow::{Context, Result};
use clap::Parser;
use sitesearch::config::{load_config_with_hash, Config, CrawlConfig};
use sitesearch::crawler::run_crawl;
use sitesearch::output::{load_statistics, print_statistics, CrawlReport, CrawlStats, MarkdownFileNotifier, Notifier};
use sitesearch::storage::{IndexStore, SqliteStorage};
use sitesearch::SiteSearchError;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sitesearch: crawl one website and search it
///
/// Sitesearch crawls every page below a base URL, skips URLs matching the
/// configured filter expressions, and stores the page content in a
/// searchable SQLite index.
#[derive(Parser, Debug)]
#[command(name = "sitesearch")]
#[command(version = "1.0.0")]
#[command(about = "Single-site crawler and search index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "search"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "search"])]
    stats: bool,

    /// Search the index instead of crawling
    #[arg(long, value_name = "QUERY", conflicts_with_all = ["dry_run", "stats"])]
    search: Option<String>,

    /// Result page to show with --search (1-based)
    #[arg(long, default_value_t = 1, requires = "search")]
    page: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context(format!("invalid configuration {}", cli.config.display()));
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(query) = &cli.search {
        handle_search(&config, query, cli.page)
    } else {
        handle_crawl(&config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitesearch=info,warn"),
            1 => EnvFilter::new("sitesearch=debug,info"),
            2 => EnvFilter::new("sitesearch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<()> {
    let crawl = CrawlConfig::from_config(config)?;

    println!("=== Sitesearch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", crawl.base_url());
    println!("  Request timeout: {}s", crawl.request_timeout().as_secs());
    println!("  Concurrent fetches: {}", crawl.max_concurrent_fetches());
    println!("  Prune stale documents: {}", crawl.prune_stale());
    println!("  User agent: {}", crawl.user_agent());

    println!("\nFilter Expressions ({}):", crawl.filter().patterns().len());
    for pattern in crawl.filter().patterns() {
        println!("  - {}", pattern);
    }

    println!("\nIndexers ({}):", crawl.indexers().len());
    for indexer in crawl.indexers() {
        println!("  - {}", indexer);
    }

    println!("\nSearch:");
    println!("  Results per page: {}", crawl.result_page_size());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);
    println!("  Recipients: {}", config.statistics.recipients.join(", "));

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", crawl.base_url());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open index database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --search mode: prints one page of ranked results
fn handle_search(config: &Config, query: &str, page: usize) -> Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open index database")?
        .with_page_size(config.search.result_page_size as usize);

    let results = storage.search(query, page)?;

    if results.is_empty() {
        println!("No results for \"{}\" on page {}", results.query, results.page);
    } else {
        println!(
            "Results for \"{}\" (page {} of {}, {} matches)\n",
            results.query, results.page, results.total_pages, results.total_matches
        );
    }

    for (offset, hit) in results.hits.iter().enumerate() {
        let rank = search_rank(results.page, results.page_size, offset);
        println!("{}. {} [score {}]", rank, hit.title, hit.score);
        println!("   {}", hit.url);
        if !hit.excerpt.is_empty() {
            println!("   {}", hit.excerpt);
        }
        println!();
    }

    if results.has_next() {
        println!("More results: --search \"{}\" --page {}", results.query, results.page + 1);
    }

    Ok(())
}

/// 1-based position of a hit across all result pages
fn search_rank(page: usize, page_size: usize, offset: usize) -> usize {
    page.saturating_sub(1)
        .saturating_mul(page_size)
        .saturating_add(offset)
        .saturating_add(1)
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<()> {
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            interrupt.cancel();
        }
    });

    match run_crawl(config, config_hash, cancel).await {
        Ok(stats) => {
            tracing::info!(
                "Crawl {}: {} pages indexed, {} errors",
                stats.outcome.to_db_string(),
                stats.pages_indexed,
                stats.errors
            );
            send_report(config, config_hash, stats);
            Ok(())
        }
        Err(SiteSearchError::StoreUnavailable { message, stats }) => {
            tracing::error!("Crawl aborted: {}", message);
            send_report(config, config_hash, *stats);
            anyhow::bail!("index store unavailable: {}", message)
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Hands the crawl report to the statistic recipients; failures are only logged
fn send_report(config: &Config, config_hash: &str, stats: CrawlStats) {
    let report = CrawlReport::new(config.crawler.base_url.clone(), stats)
        .with_recipients(config.statistics.recipients.clone())
        .with_config_hash(config_hash);

    let notifier = MarkdownFileNotifier::new(&config.output.report_path);
    if let Err(e) = notifier.notify(&report) {
        tracing::warn!("Failed to deliver crawl report: {}", e);
    }
}
