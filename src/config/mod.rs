//! Configuration module for Sitesearch
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and turning them into the immutable [`CrawlConfig`] a crawl run uses.
//!
//! # Example
//!
//! ```no_run
//! use sitesearch::config::{load_config, CrawlConfig};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitesearch.toml")).unwrap();
//! let crawl = CrawlConfig::from_config(&config).unwrap();
//! println!("Crawling below {}", crawl.base_url());
//! ```

mod crawl_config;
mod parser;
mod types;
mod validation;

pub use crawl_config::CrawlConfig;
pub use types::{Config, CrawlerConfig, OutputConfig, SearchConfig, StatisticsConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
