//! Storage module for the search index
//!
//! This module handles all database operations for the index, including:
//! - SQLite database initialization and schema management
//! - Document upserts keyed by normalized URL
//! - Ranked, paginated free-text search
//! - Crawl run tracking

mod schema;
mod search;
mod sqlite;
mod traits;

pub use search::{excerpt, paginate, score, tokenize, SearchHit, SearchPage};
pub use sqlite::SqliteStorage;
pub use traits::{IndexStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// One crawled (or indexer-provided) page as stored in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    /// Normalized URL; unique key of the index
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Indexable body text
    pub body: String,
    /// HTTP status the page was served with
    pub status: u16,
    pub crawled_at: DateTime<Utc>,
    /// Outbound links found on the page
    pub links: BTreeSet<String>,
    /// Page on which this URL was first found
    pub referrer: Option<String>,
}

impl IndexDocument {
    /// Creates a document with status 200, crawled now, without links
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: None,
            language: None,
            body: body.into(),
            status: 200,
            crawled_at: Utc::now(),
            links: BTreeSet::new(),
            referrer: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_crawled_at(mut self, crawled_at: DateTime<Utc>) -> Self {
        self.crawled_at = crawled_at;
        self
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links = links.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Hex SHA-256 over title and body; changes whenever searchable content does
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.body.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_visited: u64,
    pub pages_indexed: u64,
    pub pages_filtered: u64,
    pub errors: u64,
    pub store_errors: u64,
    pub documents_removed: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}
