//! URL handling module for Sitesearch
//!
//! This module provides URL normalization, delimited filter expressions and
//! the crawl eligibility filter.

mod filter;
mod normalize;
mod pattern;

pub use filter::{FilterDecision, UrlFilter};
pub use normalize::{normalize_parsed, normalize_url, resolve_url};
pub use pattern::FilterPattern;
