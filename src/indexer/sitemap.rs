//! Built-in indexer reading `<base>/sitemap.xml`

use crate::crawler::{FetchError, PageFetcher};
use crate::indexer::{CrawlIndexer, IndexerError};
use async_trait::async_trait;
use std::sync::Arc;
use sxd_document::{dom, parser};
use url::Url;

/// Nested sitemaps followed from one sitemap index
const MAX_NESTED_SITEMAPS: usize = 50;

/// `<loc>` values of a sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapEntries {
    /// Page URLs (`<url><loc>`)
    pub pages: Vec<String>,
    /// Nested sitemap URLs (`<sitemap><loc>`)
    pub sitemaps: Vec<String>,
}

/// Extracts the `<loc>` entries of a sitemap or sitemap index
///
/// Elements are matched by local name, so sitemaps with or without the
/// sitemaps.org namespace are accepted. Entities and CDATA sections in
/// `<loc>` are decoded by the XML parser.
pub fn parse_sitemap(xml: &str) -> Result<SitemapEntries, IndexerError> {
    let package = parser::parse(xml.trim_start_matches('\u{feff}').trim_start()).map_err(|e| {
        IndexerError::Source {
            indexer: "sitemap".to_string(),
            message: format!("invalid sitemap XML: {}", e),
        }
    })?;
    let document = package.as_document();

    let mut entries = SitemapEntries::default();
    for child in document.root().children() {
        if let Some(element) = child.element() {
            collect_locs(element, None, &mut entries);
        }
    }

    Ok(entries)
}

fn collect_locs(element: dom::Element<'_>, parent: Option<&str>, entries: &mut SitemapEntries) {
    let name = element.name().local_part();

    if name == "loc" {
        let loc = text_content(element);
        if loc.is_empty() {
            return;
        }
        match parent {
            Some("url") => entries.pages.push(loc),
            Some("sitemap") => entries.sitemaps.push(loc),
            _ => {}
        }
        return;
    }

    for child in element.children() {
        if let Some(nested) = child.element() {
            collect_locs(nested, Some(name), entries);
        }
    }
}

fn text_content(element: dom::Element<'_>) -> String {
    element
        .children()
        .iter()
        .filter_map(|child| child.text())
        .map(|text| text.text().to_string())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Contributes every page listed in the site's sitemap
pub struct SitemapIndexer {
    sitemap_url: String,
    fetcher: Arc<dyn PageFetcher>,
}

impl SitemapIndexer {
    pub fn new(base_url: &Url, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            sitemap_url: format!("{}/sitemap.xml", base_url.as_str().trim_end_matches('/')),
            fetcher,
        }
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    /// Fetches and parses one sitemap; a missing sitemap yields no entries
    async fn load(&self, location: &str) -> Result<SitemapEntries, IndexerError> {
        let url = Url::parse(location).map_err(|e| IndexerError::InvalidUrl(format!("{}: {}", location, e)))?;

        match self.fetcher.fetch(&url).await {
            Ok(result) => parse_sitemap(&String::from_utf8_lossy(&result.body)),
            Err(FetchError::Http { status: 404, .. }) | Err(FetchError::Http { status: 410, .. }) => {
                tracing::debug!("No sitemap at {}", location);
                Ok(SitemapEntries::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CrawlIndexer for SitemapIndexer {
    fn name(&self) -> &str {
        "sitemap"
    }

    async fn discover_urls(&self) -> Result<Vec<String>, IndexerError> {
        let root = self.load(&self.sitemap_url).await?;
        let mut pages = root.pages;

        for nested in root.sitemaps.iter().take(MAX_NESTED_SITEMAPS) {
            match self.load(nested).await {
                Ok(entries) => pages.extend(entries.pages),
                Err(e) => tracing::warn!("Skipping nested sitemap {}: {}", nested, e),
            }
        }

        tracing::info!("Sitemap listed {} URLs", pages.len());
        Ok(pages)
    }
}
