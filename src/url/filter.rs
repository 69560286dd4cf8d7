//! Crawl eligibility rules
//!
//! A candidate URL is eligible when it lies below the base URL (containment)
//! and none of the configured filter expressions match it.

use crate::url::normalize::normalize_parsed;
use crate::url::{normalize_url, FilterPattern};
use crate::ConfigError;
use url::Url;

/// Outcome of checking a candidate URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Eligible; carries the normalized URL
    Accepted(Url),
    /// Not below the base URL
    OutsideBase,
    /// Matched the filter expression with this source
    Excluded(String),
    /// Not an HTTP(S) URL or could not be resolved
    Invalid,
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Base-URL containment plus regex exclusion list
#[derive(Debug, Clone)]
pub struct UrlFilter {
    base_url: Url,
    base_prefix: String,
    patterns: Vec<FilterPattern>,
}

impl UrlFilter {
    /// Creates a filter for `base_url` with the given exclusion patterns
    ///
    /// The base URL is normalized; a trailing slash makes no difference.
    pub fn new(base_url: &str, patterns: Vec<FilterPattern>) -> Result<Self, ConfigError> {
        let base_url = normalize_url(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", base_url, e)))?;
        let base_prefix = base_url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            base_prefix,
            patterns,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn patterns(&self) -> &[FilterPattern] {
        &self.patterns
    }

    /// Returns true if `url` (absolute or relative to the base URL) may be crawled
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesearch::url::{FilterPattern, UrlFilter};
    ///
    /// let filter = UrlFilter::new(
    ///     "https://example.com/",
    ///     vec![FilterPattern::parse(r"#date\=#i").unwrap()],
    /// )
    /// .unwrap();
    ///
    /// assert!(filter.is_eligible("/a"));
    /// assert!(!filter.is_eligible("/a?date=1"));
    /// assert!(!filter.is_eligible("https://other.com/x"));
    /// ```
    pub fn is_eligible(&self, url: &str) -> bool {
        self.check(url).is_accepted()
    }

    /// Checks a link-discovered candidate: containment, then filter expressions
    pub fn check(&self, url: &str) -> FilterDecision {
        self.evaluate(url, true)
    }

    /// Checks an indexer-contributed URL: filter expressions only
    pub fn check_indexed(&self, url: &str) -> FilterDecision {
        self.evaluate(url, false)
    }

    fn evaluate(&self, url: &str, require_containment: bool) -> FilterDecision {
        let Ok(mut raw) = self.base_url.join(url.trim()) else {
            return FilterDecision::Invalid;
        };
        raw.set_fragment(None);

        let raw_str = raw.as_str().to_string();
        let Ok(normalized) = normalize_parsed(raw) else {
            return FilterDecision::Invalid;
        };

        if require_containment && !self.contains(&normalized) {
            return FilterDecision::OutsideBase;
        }

        if let Some(pattern) = self.matching_pattern(&raw_str) {
            return FilterDecision::Excluded(pattern.source().to_string());
        }

        FilterDecision::Accepted(normalized)
    }

    /// Returns true if the normalized `url` starts with the base URL at a path boundary
    pub fn contains(&self, url: &Url) -> bool {
        match url.as_str().strip_prefix(&self.base_prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }

    /// Returns the first configured expression matching the raw URL string
    pub fn matching_pattern(&self, raw_url: &str) -> Option<&FilterPattern> {
        self.patterns.iter().find(|p| p.is_match(raw_url))
    }
}
