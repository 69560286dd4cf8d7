//! In-memory indexer serving a fixed set of documents

use crate::indexer::{CrawlIndexer, IndexerError};
use crate::storage::IndexDocument;
use crate::url::normalize_url;
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

/// Serves fixed documents and announces fixed URLs
///
/// Every document's URL is also announced during discovery, so a document
/// reaches the index even when no page links to it.
#[derive(Debug, Clone)]
pub struct StaticIndexer {
    name: String,
    urls: Vec<String>,
    documents: HashMap<String, IndexDocument>,
}

impl StaticIndexer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            urls: Vec::new(),
            documents: HashMap::new(),
        }
    }

    /// Announces a URL without providing its document; it is fetched normally
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !self.urls.contains(&url) {
            self.urls.push(url);
        }
        self
    }

    /// Adds a document, keyed by its normalized URL
    pub fn with_document(mut self, document: IndexDocument) -> Result<Self, IndexerError> {
        let key = normalize_url(&document.url)
            .map_err(|e| IndexerError::InvalidUrl(format!("{}: {}", document.url, e)))?
            .to_string();

        if !self.urls.contains(&key) {
            self.urls.push(key.clone());
        }
        self.documents.insert(key, document);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl CrawlIndexer for StaticIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover_urls(&self) -> Result<Vec<String>, IndexerError> {
        Ok(self.urls.clone())
    }

    async fn provide_document(&self, url: &Url) -> Result<Option<IndexDocument>, IndexerError> {
        Ok(self.documents.get(url.as_str()).cloned())
    }
}
