//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Collecting per-run crawl statistics
//! - Generating markdown reports of crawl results
//! - Delivering reports to the configured statistic recipients

mod markdown;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_report, generate_markdown_report, MarkdownFileNotifier};
pub use stats::{load_statistics, print_statistics, CrawlStats, IndexStatistics, PageFailure};
pub use traits::{CrawlReport, Notifier, ReportError, ReportResult};
