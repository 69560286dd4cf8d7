//! Report types and the notifier interface
//!
//! A finished crawl is turned into a `CrawlReport` and handed to a
//! `Notifier`, which delivers it to the configured statistic recipients.

use crate::output::CrawlStats;
use thiserror::Error;

/// Errors that can occur while delivering a report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No recipients configured")]
    NoRecipients,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Everything a recipient needs to know about a finished run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub base_url: String,
    pub config_hash: String,
    pub recipients: Vec<String>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    pub fn new(base_url: impl Into<String>, stats: CrawlStats) -> Self {
        Self {
            base_url: base_url.into(),
            config_hash: String::new(),
            recipients: Vec::new(),
            stats,
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }
}

/// Delivers crawl reports
pub trait Notifier {
    fn notify(&self, report: &CrawlReport) -> ReportResult<()>;
}
