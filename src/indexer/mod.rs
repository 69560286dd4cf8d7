//! Custom indexers
//!
//! Indexers contribute URLs and documents that normal link discovery would
//! never find: records from an application's own data, sitemap entries,
//! non-HTML content. They are assembled into an `IndexerRegistry` once at
//! startup from the configured identifiers.

mod registry;
mod sitemap;
mod static_indexer;

pub use registry::IndexerRegistry;
pub use sitemap::{parse_sitemap, SitemapEntries, SitemapIndexer};
pub use static_indexer::StaticIndexer;

use crate::crawler::FetchError;
use crate::storage::IndexDocument;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Identifiers accepted in the `indexer` configuration list
pub const BUILTIN_INDEXERS: &[&str] = &["sitemap"];

/// Errors raised by indexers
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer '{indexer}' failed: {message}")]
    Source { indexer: String, message: String },

    #[error("Indexer returned an invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Indexer fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Capability contract for custom indexers
///
/// Both operations are optional; the defaults contribute nothing.
#[async_trait]
pub trait CrawlIndexer: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    /// URLs to seed the frontier with at crawl start
    async fn discover_urls(&self) -> Result<Vec<String>, IndexerError> {
        Ok(Vec::new())
    }

    /// A document for `url`, replacing the fetch when `Some`
    ///
    /// `url` is normalized. The returned document is stored under `url`
    /// regardless of its own `url` field.
    async fn provide_document(&self, _url: &Url) -> Result<Option<IndexDocument>, IndexerError> {
        Ok(None)
    }
}
