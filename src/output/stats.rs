//! Crawl run statistics
//!
//! `CrawlStats` is produced once per run by the coordinator. Statistics of
//! earlier runs are loaded back from the index store for `--stats`.

use crate::storage::{IndexStore, RunRecord, RunStatus, StorageResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// A per-page failure kept for the crawl report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: String,
    pub reason: String,
}

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlStats {
    /// Run record ID, once the run is registered in the store
    pub run_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// URLs taken from the frontier (fetched or provided)
    pub pages_visited: u64,
    /// Documents written to the index
    pub pages_indexed: u64,
    /// Documents supplied by indexers instead of fetched
    pub pages_provided: u64,
    /// Distinct candidate URLs rejected by containment or filter expressions
    pub pages_filtered: u64,

    /// Fetch and indexer failures
    pub errors: u64,
    /// Failed index writes
    pub store_errors: u64,
    /// Pages whose body could not be decoded
    pub parse_errors: u64,
    /// Responses skipped because they were not HTML
    pub non_html_skipped: u64,
    /// Stale documents pruned after the run
    pub documents_removed: u64,

    pub outcome: RunStatus,

    /// Indexed pages by link depth
    pub depth_breakdown: BTreeMap<u32, u64>,
    pub failures: Vec<PageFailure>,
}

impl CrawlStats {
    /// Creates empty statistics for a run starting at `started_at`
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: None,
            started_at,
            finished_at: started_at,
            pages_visited: 0,
            pages_indexed: 0,
            pages_provided: 0,
            pages_filtered: 0,
            errors: 0,
            store_errors: 0,
            parse_errors: 0,
            non_html_skipped: 0,
            documents_removed: 0,
            outcome: RunStatus::Running,
            depth_breakdown: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Stamps the end of the run
    pub fn finish(&mut self, outcome: RunStatus) {
        self.finished_at = Utc::now();
        self.outcome = outcome;
    }

    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }

    pub fn record_failure(&mut self, url: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(PageFailure {
            url: url.into(),
            reason: reason.into(),
        });
    }

    pub fn record_depth(&mut self, depth: u32) {
        *self.depth_breakdown.entry(depth).or_insert(0) += 1;
    }

    /// Share of visited pages that ended up in the index, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pages_visited == 0 {
            return 0.0;
        }
        (self.pages_indexed as f64 / self.pages_visited as f64) * 100.0
    }
}

/// Statistics stored in the index database
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    pub documents: u64,
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from an index store
pub fn load_statistics(store: &dyn IndexStore) -> StorageResult<IndexStatistics> {
    Ok(IndexStatistics {
        documents: store.count()?,
        latest_run: store.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Index Statistics ===\n");
    println!("  Documents indexed: {}", stats.documents);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Pages visited: {}", run.pages_visited);
            println!("  Pages indexed: {}", run.pages_indexed);
            println!("  Pages filtered: {}", run.pages_filtered);
            println!("  Errors: {}", run.errors);
            println!("  Store errors: {}", run.store_errors);
            println!("  Documents removed: {}", run.documents_removed);
        }
        None => println!("No crawl runs recorded yet."),
    }
}
