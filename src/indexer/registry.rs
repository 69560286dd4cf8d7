//! Ordered collection of indexers consulted by the coordinator

use crate::crawler::PageFetcher;
use crate::indexer::{CrawlIndexer, IndexerError, SitemapIndexer};
use crate::storage::IndexDocument;
use crate::ConfigError;
use std::sync::Arc;
use url::Url;

/// Registered indexers, consulted in registration order
#[derive(Clone, Default)]
pub struct IndexerRegistry {
    indexers: Vec<Arc<dyn CrawlIndexer>>,
}

impl std::fmt::Debug for IndexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerRegistry")
            .field("indexers", &self.names())
            .finish()
    }
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry for the configured identifiers
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownIndexer` for an identifier without an implementation.
    pub fn from_identifiers(
        identifiers: &[String],
        base_url: &Url,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        for identifier in identifiers {
            match identifier.as_str() {
                "sitemap" => registry.register(SitemapIndexer::new(base_url, Arc::clone(&fetcher))),
                other => return Err(ConfigError::UnknownIndexer(other.to_string())),
            }
        }

        Ok(registry)
    }

    pub fn register<I: CrawlIndexer + 'static>(&mut self, indexer: I) {
        self.indexers.push(Arc::new(indexer));
    }

    /// Builder form of `register`
    pub fn with<I: CrawlIndexer + 'static>(mut self, indexer: I) -> Self {
        self.register(indexer);
        self
    }

    pub fn len(&self) -> usize {
        self.indexers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.indexers.iter().map(|i| i.name()).collect()
    }

    /// Collects the discovered URLs of every indexer
    ///
    /// A failing indexer contributes its error; the others still run.
    pub async fn discover_all(&self) -> (Vec<String>, Vec<IndexerError>) {
        let mut urls = Vec::new();
        let mut errors = Vec::new();

        for indexer in &self.indexers {
            match indexer.discover_urls().await {
                Ok(found) => {
                    tracing::debug!("Indexer '{}' discovered {} URLs", indexer.name(), found.len());
                    urls.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Indexer '{}' failed during discovery: {}", indexer.name(), e);
                    errors.push(e);
                }
            }
        }

        (urls, errors)
    }

    /// Asks each indexer in turn for a document; the first one provided wins
    pub async fn provide_document(&self, url: &Url) -> Result<Option<IndexDocument>, IndexerError> {
        for indexer in &self.indexers {
            if let Some(document) = indexer.provide_document(url).await? {
                tracing::debug!("Indexer '{}' provided {}", indexer.name(), url);
                return Ok(Some(document));
            }
        }
        Ok(None)
    }
}
