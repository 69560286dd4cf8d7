//! Pending-work queue and visited set for one crawl run
//!
//! Every URL held here is already normalized, so the frontier and the index
//! store agree on what "the same page" means.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// How a task entered the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOrigin {
    /// The base URL
    Seed,
    /// A hyperlink on a crawled page
    Link,
    /// Contributed by an indexer while seeding
    Indexer,
}

/// A URL waiting to be processed, plus how it was discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: Url,
    /// Page on which the URL was found
    pub referrer: Option<Url>,
    /// Number of link hops from a seed
    pub depth: u32,
    pub origin: TaskOrigin,
}

impl CrawlTask {
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            referrer: None,
            depth: 0,
            origin: TaskOrigin::Seed,
        }
    }

    pub fn indexed(url: Url) -> Self {
        Self {
            url,
            referrer: None,
            depth: 0,
            origin: TaskOrigin::Indexer,
        }
    }

    /// A task for `url` found on the page of `parent`
    pub fn link(url: Url, parent: &CrawlTask) -> Self {
        Self {
            url,
            referrer: Some(parent.url.clone()),
            depth: parent.depth + 1,
            origin: TaskOrigin::Link,
        }
    }
}

/// FIFO queue of pending tasks plus the insertion-only visited set
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
    pending: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` unless its URL is already visited or pending
    ///
    /// Returns true if the task was queued.
    pub fn enqueue(&mut self, task: CrawlTask) -> bool {
        let key = task.url.as_str();
        if self.visited.contains(key) || self.pending.contains(key) {
            return false;
        }
        self.pending.insert(key.to_string());
        self.queue.push_back(task);
        true
    }

    /// Removes the oldest pending task
    pub fn dequeue(&mut self) -> Option<CrawlTask> {
        let task = self.queue.pop_front()?;
        self.pending.remove(task.url.as_str());
        Some(task)
    }

    /// Marks a URL as visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    /// Dequeues the next task and marks it visited in one step
    ///
    /// Tasks whose URL was visited after they were queued (e.g. as the
    /// target of a redirect) are dropped.
    pub fn claim_next(&mut self) -> Option<CrawlTask> {
        while let Some(task) = self.dequeue() {
            if self.mark_visited(&task.url) {
                return Some(task);
            }
        }
        None
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn is_pending(&self, url: &Url) -> bool {
        self.pending.contains(url.as_str())
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Visited URLs, in no particular order
    pub fn visited(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(String::as_str)
    }
}
