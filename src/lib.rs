//! Sitesearch: a single-site crawler and search index
//!
//! This crate crawls every page reachable from one base URL, filters links
//! through a containment rule and a list of delimited regular expressions,
//! and stores the extracted page content in a searchable SQLite index.

pub mod config;
pub mod crawler;
pub mod indexer;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitesearch operations
#[derive(Debug, Error)]
pub enum SiteSearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index store unavailable, crawl aborted: {message}")]
    StoreUnavailable {
        message: String,
        stats: Box<output::CrawlStats>,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown indexer: {0}")]
    UnknownIndexer(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sitesearch operations
pub type Result<T> = std::result::Result<T, SiteSearchError>;

// Re-export commonly used types
pub use config::{Config, CrawlConfig};
pub use crawler::{Coordinator, Frontier};
pub use indexer::{CrawlIndexer, IndexerRegistry};
pub use output::CrawlStats;
pub use state::CrawlPhase;
pub use storage::{IndexDocument, IndexStore, SearchPage, SqliteStorage};
pub use url::{normalize_url, UrlFilter};
