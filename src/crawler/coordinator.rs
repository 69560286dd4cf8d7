//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding the frontier with the base URL and indexer URLs
//! - Dispatching fetches to a bounded worker pool
//! - Filtering and enqueueing discovered links
//! - Writing documents to the index store
//! - Handling cancellation and store failures
//! - Producing the final crawl statistics
//!
//! The frontier and the index store are only touched from the coordinator
//! task. Workers fetch and parse; everything that changes crawl state
//! happens here, one result at a time.

use crate::config::CrawlConfig;
use crate::crawler::frontier::{CrawlTask, Frontier, TaskOrigin};
use crate::crawler::parser::{parse_body, ParsedPage};
use crate::crawler::{FetchError, PageFetcher};
use crate::indexer::{IndexerError, IndexerRegistry};
use crate::output::CrawlStats;
use crate::state::CrawlPhase;
use crate::storage::{IndexDocument, IndexStore, RunStatus, StorageError};
use crate::url::{normalize_parsed, FilterDecision};
use crate::SiteSearchError;
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Consecutive failed writes after which the store is considered unavailable
pub const MAX_CONSECUTIVE_STORE_FAILURES: u32 = 5;

/// What a worker produced for one task
#[derive(Debug)]
enum TaskOutcome {
    /// An indexer supplied the document; nothing was fetched
    Provided(IndexDocument),
    /// HTML page fetched and parsed
    Fetched {
        status: u16,
        final_url: Url,
        page: ParsedPage,
    },
    /// Fetched, but not HTML
    NotHtml { content_type: String },
    Failed(FetchError),
}

#[derive(Debug)]
struct TaskResult {
    task: CrawlTask,
    indexer_error: Option<IndexerError>,
    outcome: TaskOutcome,
}

/// Bookkeeping that only lives for one run
#[derive(Debug, Default)]
struct RunState {
    /// Distinct candidate URLs rejected by the filter
    filtered: HashSet<String>,
    /// Store keys written (or attempted) this run; everything else is stale
    retained: HashSet<String>,
    consecutive_store_failures: u32,
}

/// Runs one crawl from seeding to final statistics
///
/// Generic over the index store so tests can substitute a failing one;
/// the fetcher and the indexers are trait objects assembled at startup.
pub struct Coordinator<S: IndexStore> {
    config: CrawlConfig,
    store: S,
    fetcher: Arc<dyn PageFetcher>,
    indexers: Arc<IndexerRegistry>,
    frontier: Frontier,
    phase: CrawlPhase,
    cancel: CancellationToken,
    config_hash: String,
}

impl<S: IndexStore> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The immutable run configuration
    /// * `store` - The index the crawl writes into
    /// * `fetcher` - Used for every page fetch
    /// * `indexers` - Consulted while seeding and before every fetch
    pub fn new(
        config: CrawlConfig,
        store: S,
        fetcher: Arc<dyn PageFetcher>,
        indexers: IndexerRegistry,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            indexers: Arc::new(indexers),
            frontier: Frontier::new(),
            phase: CrawlPhase::Idle,
            cancel: CancellationToken::new(),
            config_hash: String::new(),
        }
    }

    /// Uses `token` to stop the run from outside
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Hash of the configuration file, recorded with the run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), SiteSearchError> {
        if !self.phase.can_transition_to(next) {
            return Err(SiteSearchError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Runs the crawl to completion, cancellation or a fatal store failure
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - Run completed or was cancelled; see `outcome`
    /// * `Err(SiteSearchError::StoreUnavailable)` - Aborted; carries partial statistics
    /// * `Err(SiteSearchError::InvalidTransition)` - The coordinator already ran
    pub async fn run(&mut self) -> Result<CrawlStats, SiteSearchError> {
        self.transition(CrawlPhase::Seeding)?;
        let mut stats = CrawlStats::new(Utc::now());
        let mut state = RunState::default();

        tracing::info!("Starting crawl of {}", self.config.base_url());

        let run_id = match self.store.create_run(&self.config_hash) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Cannot register crawl run: {}", e);
                stats.store_errors += 1;
                return self.abort(stats, e);
            }
        };
        stats.run_id = Some(run_id);

        let status = if self.seed(&mut stats, &mut state).await {
            self.transition(CrawlPhase::Crawling)?;
            match self.crawl(&mut stats, &mut state).await {
                Ok(status) => status,
                Err(e) => {
                    stats.pages_filtered = state.filtered.len() as u64;
                    return self.abort(stats, e);
                }
            }
        } else {
            tracing::info!("Cancellation requested while seeding");
            RunStatus::Cancelled
        };
        stats.pages_filtered = state.filtered.len() as u64;

        self.transition(CrawlPhase::Finalizing)?;

        if status == RunStatus::Completed && self.config.prune_stale() {
            self.prune(&mut stats, &state);
        }

        stats.finish(status);

        if let Err(e) = self.store.complete_run(run_id, &stats) {
            tracing::warn!("Failed to record run {}: {}", run_id, e);
        }
        if let Err(e) = self.store.flush() {
            tracing::warn!("Failed to flush index: {}", e);
        }

        self.transition(CrawlPhase::Done)?;

        tracing::info!(
            "Crawl {}: {} visited, {} indexed, {} filtered, {} errors in {}s",
            status.to_db_string(),
            stats.pages_visited,
            stats.pages_indexed,
            stats.pages_filtered,
            stats.errors,
            stats.duration().num_seconds()
        );

        Ok(stats)
    }

    /// Finishes the run as aborted and returns the partial statistics inside the error
    fn abort(&mut self, mut stats: CrawlStats, cause: StorageError) -> Result<CrawlStats, SiteSearchError> {
        self.transition(CrawlPhase::Finalizing)?;
        stats.finish(RunStatus::Aborted);

        if let Some(run_id) = stats.run_id {
            if let Err(e) = self.store.complete_run(run_id, &stats) {
                tracing::debug!("Could not record aborted run {}: {}", run_id, e);
            }
        }

        self.transition(CrawlPhase::Done)?;
        tracing::error!("Crawl aborted, index store unavailable: {}", cause);

        Err(SiteSearchError::StoreUnavailable {
            message: cause.to_string(),
            stats: Box::new(stats),
        })
    }

    /// Pushes the base URL and every indexer-discovered URL into the frontier
    ///
    /// Returns false when the run was cancelled before discovery finished.
    async fn seed(&mut self, stats: &mut CrawlStats, state: &mut RunState) -> bool {
        let base = self.config.base_url().clone();
        match self.config.filter().check(base.as_str()) {
            FilterDecision::Accepted(url) => {
                self.frontier.enqueue(CrawlTask::seed(url));
            }
            decision => {
                tracing::warn!("Base URL {} rejected by filter: {:?}", base, decision);
                state.filtered.insert(base.to_string());
            }
        }

        if self.indexers.is_empty() {
            return true;
        }

        let indexers = Arc::clone(&self.indexers);
        let (urls, errors) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            discovered = indexers.discover_all() => discovered,
        };
        for error in errors {
            stats.errors += 1;
            stats.record_failure("(indexer discovery)", error.to_string());
        }

        for raw in urls {
            match self.config.filter().check_indexed(&raw) {
                FilterDecision::Accepted(url) => {
                    if self.frontier.enqueue(CrawlTask::indexed(url)) {
                        tracing::debug!("Seeded from indexer: {}", raw);
                    }
                }
                decision => {
                    tracing::debug!("Indexer URL {} rejected: {:?}", raw, decision);
                    state.filtered.insert(candidate_key(&raw));
                }
            }
        }

        tracing::info!("Seeded frontier with {} URLs", self.frontier.len());
        true
    }

    /// Main loop: dispatch tasks, then apply results as they complete
    async fn crawl(&mut self, stats: &mut CrawlStats, state: &mut RunState) -> Result<RunStatus, StorageError> {
        let limit = self.config.max_concurrent_fetches();
        let timeout = self.config.request_timeout();
        let cancel = self.cancel.clone();
        let mut workers: JoinSet<TaskResult> = JoinSet::new();
        let mut cancelled = false;
        let mut processed: u64 = 0;

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                tracing::info!(
                    "Cancellation requested, waiting for {} in-flight fetches",
                    workers.len()
                );
            }

            if !cancelled {
                while workers.len() < limit {
                    let Some(task) = self.frontier.claim_next() else {
                        break;
                    };
                    stats.pages_visited += 1;
                    tracing::debug!("Processing URL: {}", task.url);
                    workers.spawn(process_task(
                        task,
                        Arc::clone(&self.fetcher),
                        Arc::clone(&self.indexers),
                        timeout,
                    ));
                }
            }

            if workers.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => continue,
                joined = workers.join_next() => joined,
            };

            match joined {
                Some(Ok(result)) => self.apply(result, stats, state)?,
                Some(Err(e)) => {
                    stats.errors += 1;
                    tracing::warn!("Crawl worker failed: {}", e);
                }
                None => break,
            }

            processed += 1;
            if processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages visited, {} indexed, {} in frontier",
                    stats.pages_visited,
                    stats.pages_indexed,
                    self.frontier.len()
                );
            }
        }

        if cancelled {
            Ok(RunStatus::Cancelled)
        } else {
            tracing::info!("Frontier is empty, crawl complete");
            Ok(RunStatus::Completed)
        }
    }

    /// Applies one worker result to the frontier, the store and the statistics
    fn apply(&mut self, result: TaskResult, stats: &mut CrawlStats, state: &mut RunState) -> Result<(), StorageError> {
        let TaskResult {
            task,
            indexer_error,
            outcome,
        } = result;

        if let Some(e) = indexer_error {
            stats.errors += 1;
            tracing::warn!("Indexer failed for {}, fetching instead: {}", task.url, e);
            stats.record_failure(task.url.as_str(), e.to_string());
        }

        match outcome {
            TaskOutcome::Provided(mut document) => {
                stats.pages_provided += 1;
                document.url = task.url.to_string();
                if document.referrer.is_none() {
                    document.referrer = task.referrer.as_ref().map(Url::to_string);
                }
                self.store_document(document, task.depth, stats, state)
            }

            TaskOutcome::Failed(e) => {
                stats.errors += 1;
                tracing::warn!("{}", e);
                stats.record_failure(task.url.as_str(), e.to_string());
                Ok(())
            }

            TaskOutcome::NotHtml { content_type } => {
                stats.non_html_skipped += 1;
                tracing::debug!("Skipping {}: content type {}", task.url, content_type);
                Ok(())
            }

            TaskOutcome::Fetched {
                status,
                final_url,
                page,
            } => {
                let Some(document_url) = self.resolve_final_url(&task, final_url) else {
                    return Ok(());
                };

                if let Some(message) = &page.parse_error {
                    stats.parse_errors += 1;
                    tracing::warn!("Parse error for {}: {}", document_url, message);
                    stats.record_failure(document_url.as_str(), message.clone());
                }

                let parent = CrawlTask {
                    url: document_url.clone(),
                    ..task
                };
                let links = self.follow_links(&parent, &page.links, state);

                if page.full_ignore {
                    tracing::debug!("{} is marked CRAWL_FULL_IGNORE, not indexed", document_url);
                    return Ok(());
                }

                let mut document = IndexDocument::new(
                    document_url.as_str(),
                    page.title.unwrap_or_else(|| document_url.to_string()),
                    page.text,
                )
                .with_status(status)
                .with_links(links);
                document.description = page.description;
                document.language = page.language;
                document.referrer = parent.referrer.as_ref().map(Url::to_string);

                self.store_document(document, parent.depth, stats, state)
            }
        }
    }

    /// Decides which URL a fetched page is stored under
    ///
    /// Without a redirect that is the task URL. A redirect target is used
    /// when it is itself eligible and has not been visited yet; otherwise
    /// the page is skipped.
    fn resolve_final_url(&mut self, task: &CrawlTask, final_url: Url) -> Option<Url> {
        let final_url = match normalize_parsed(final_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping {}: unusable redirect target: {}", task.url, e);
                return None;
            }
        };

        if final_url == task.url {
            return Some(final_url);
        }

        let decision = match task.origin {
            TaskOrigin::Indexer => self.config.filter().check_indexed(final_url.as_str()),
            TaskOrigin::Seed | TaskOrigin::Link => self.config.filter().check(final_url.as_str()),
        };

        match decision {
            FilterDecision::Accepted(url) if self.frontier.mark_visited(&url) => {
                tracing::debug!("{} redirected to {}", task.url, url);
                Some(url)
            }
            FilterDecision::Accepted(url) => {
                tracing::debug!("{} redirected to already visited {}", task.url, url);
                None
            }
            decision => {
                tracing::debug!("{} redirected to rejected {}: {:?}", task.url, final_url, decision);
                None
            }
        }
    }

    /// Filters the links of a page, enqueues eligible ones and returns the outbound link set
    fn follow_links(&mut self, parent: &CrawlTask, links: &[Url], state: &mut RunState) -> BTreeSet<String> {
        let mut outbound = BTreeSet::new();

        for link in links {
            outbound.insert(candidate_key(link.as_str()));

            match self.config.filter().check(link.as_str()) {
                FilterDecision::Accepted(url) => {
                    if self.frontier.enqueue(CrawlTask::link(url, parent)) {
                        tracing::trace!("Enqueued {}", link);
                    }
                }
                decision => {
                    tracing::trace!("Filtered {}: {:?}", link, decision);
                    state.filtered.insert(candidate_key(link.as_str()));
                }
            }
        }

        outbound
    }

    /// Upserts one document; escalates when the store is gone
    fn store_document(
        &mut self,
        document: IndexDocument,
        depth: u32,
        stats: &mut CrawlStats,
        state: &mut RunState,
    ) -> Result<(), StorageError> {
        state.retained.insert(document.url.clone());

        match self.store.upsert(&document) {
            Ok(()) => {
                stats.pages_indexed += 1;
                stats.record_depth(depth);
                state.consecutive_store_failures = 0;
                Ok(())
            }
            Err(e) => {
                stats.store_errors += 1;
                state.consecutive_store_failures += 1;
                tracing::warn!("Failed to index {}: {}", document.url, e);
                stats.record_failure(document.url.as_str(), e.to_string());

                if e.is_fatal() || state.consecutive_store_failures >= MAX_CONSECUTIVE_STORE_FAILURES {
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Removes documents that were not written during this run
    fn prune(&mut self, stats: &mut CrawlStats, state: &RunState) {
        let urls = match self.store.urls() {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Skipping stale document pruning: {}", e);
                return;
            }
        };

        for url in urls.into_iter().filter(|u| !state.retained.contains(u)) {
            match self.store.remove(&url) {
                Ok(true) => {
                    stats.documents_removed += 1;
                    tracing::debug!("Removed stale document {}", url);
                }
                Ok(false) => {}
                Err(e) => {
                    stats.store_errors += 1;
                    tracing::warn!("Failed to remove stale document {}: {}", url, e);
                    if e.is_fatal() {
                        return;
                    }
                }
            }
        }

        if stats.documents_removed > 0 {
            tracing::info!("Pruned {} stale documents", stats.documents_removed);
        }
    }
}

/// Key used to count a candidate URL once: normalized when possible
fn candidate_key(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|url| normalize_parsed(url).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Worker body: indexer first, then fetch and parse
async fn process_task(
    task: CrawlTask,
    fetcher: Arc<dyn PageFetcher>,
    indexers: Arc<IndexerRegistry>,
    timeout: Duration,
) -> TaskResult {
    let mut indexer_error = None;

    if !indexers.is_empty() {
        match indexers.provide_document(&task.url).await {
            Ok(Some(document)) => {
                return TaskResult {
                    task,
                    indexer_error,
                    outcome: TaskOutcome::Provided(document),
                }
            }
            Ok(None) => {}
            Err(e) => indexer_error = Some(e),
        }
    }

    let fetched = match tokio::time::timeout(timeout, fetcher.fetch(&task.url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Network {
            url: task.url.to_string(),
            message: "Request timeout".to_string(),
        }),
    };

    let outcome = match fetched {
        Ok(result) if !result.is_html() => TaskOutcome::NotHtml {
            content_type: result.content_type.unwrap_or_default(),
        },
        Ok(result) => {
            let page = parse_body(&result.body, &result.final_url);
            TaskOutcome::Fetched {
                status: result.status,
                final_url: result.final_url,
                page,
            }
        }
        Err(e) => TaskOutcome::Failed(e),
    };

    TaskResult {
        task,
        indexer_error,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchResult;
    use crate::indexer::{CrawlIndexer, StaticIndexer};
    use crate::output::CrawlStats;
    use crate::storage::{RunRecord, SearchPage, SqliteStorage, StorageResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BASE: &str = "https://example.com/";

    #[derive(Clone)]
    enum Page {
        Html(String),
        /// Served as `text/html` without any UTF-8 check
        Bytes(Vec<u8>),
        Status(u16),
        Binary(&'static str),
        Redirect(&'static str),
    }

    /// In-memory site keyed by path
    #[derive(Default)]
    struct MockSite {
        pages: HashMap<String, Page>,
        fetches: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Option<Duration>,
        cancel_on_fetch: Option<CancellationToken>,
    }

    impl MockSite {
        fn new() -> Self {
            Self::default()
        }

        fn html(mut self, path: &str, body: &str) -> Self {
            self.pages.insert(path.to_string(), Page::Html(body.to_string()));
            self
        }

        fn page(mut self, path: &str, page: Page) -> Self {
            self.pages.insert(path.to_string(), page);
            self
        }

        fn fetch_count(&self, path: &str) -> usize {
            self.fetches.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        fn total_fetches(&self) -> usize {
            self.fetches.lock().unwrap().values().sum()
        }

        fn ok(url: Url, content_type: &str, body: &str) -> FetchResult {
            FetchResult {
                status: 200,
                final_url: url,
                content_type: Some(content_type.to_string()),
                body: body.as_bytes().to_vec(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MockSite {
        async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
            let key = match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            };
            *self.fetches.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(token) = &self.cancel_on_fetch {
                token.cancel();
            }

            match self.pages.get(&key) {
                Some(Page::Html(body)) => Ok(Self::ok(url.clone(), "text/html; charset=utf-8", body)),
                Some(Page::Bytes(body)) => Ok(FetchResult {
                    status: 200,
                    final_url: url.clone(),
                    content_type: Some("text/html".to_string()),
                    body: body.clone(),
                }),
                Some(Page::Binary(content_type)) => Ok(Self::ok(url.clone(), content_type, "%PDF")),
                Some(Page::Status(status)) => Err(FetchError::Http {
                    url: url.to_string(),
                    status: *status,
                }),
                Some(Page::Redirect(target)) => {
                    let target_url = url.join(target).unwrap();
                    if target_url.host_str() != url.host_str() {
                        return Ok(Self::ok(target_url, "text/html", "<p>elsewhere</p>"));
                    }
                    match self.pages.get(target_url.path()) {
                        Some(Page::Html(body)) => Ok(Self::ok(target_url, "text/html", body)),
                        _ => Err(FetchError::Http {
                            url: target_url.to_string(),
                            status: 404,
                        }),
                    }
                }
                None => Err(FetchError::Http {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    /// Store wrapper that fails writes for chosen URLs
    struct FlakyStore {
        inner: SqliteStorage,
        failing: HashSet<String>,
        fatal: bool,
    }

    impl FlakyStore {
        fn new(failing: &[&str], fatal: bool) -> Self {
            Self {
                inner: SqliteStorage::open_in_memory().unwrap(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                fatal,
            }
        }
    }

    impl IndexStore for FlakyStore {
        fn upsert(&mut self, document: &IndexDocument) -> StorageResult<()> {
            if self.failing.contains(&document.url) || self.failing.contains("*") {
                return Err(if self.fatal {
                    StorageError::Unavailable("disk gone".to_string())
                } else {
                    StorageError::Database("constraint failed".to_string())
                });
            }
            self.inner.upsert(document)
        }
        fn get(&self, url: &str) -> StorageResult<Option<IndexDocument>> {
            self.inner.get(url)
        }
        fn remove(&mut self, url: &str) -> StorageResult<bool> {
            self.inner.remove(url)
        }
        fn urls(&self) -> StorageResult<Vec<String>> {
            self.inner.urls()
        }
        fn count(&self) -> StorageResult<u64> {
            self.inner.count()
        }
        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }
        fn page_size(&self) -> usize {
            self.inner.page_size()
        }
        fn search(&self, query: &str, page: usize) -> StorageResult<SearchPage> {
            self.inner.search(query, page)
        }
        fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
            self.inner.create_run(config_hash)
        }
        fn complete_run(&mut self, run_id: i64, stats: &CrawlStats) -> StorageResult<()> {
            self.inner.complete_run(run_id, stats)
        }
        fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
            self.inner.get_run(run_id)
        }
        fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
            self.inner.latest_run()
        }
    }

    fn config(filters: &[&str]) -> CrawlConfig {
        CrawlConfig::new(BASE).unwrap().with_filters(filters).unwrap()
    }

    fn coordinator(
        config: CrawlConfig,
        site: Arc<MockSite>,
        indexers: IndexerRegistry,
    ) -> Coordinator<SqliteStorage> {
        Coordinator::new(config, SqliteStorage::open_in_memory().unwrap(), site, indexers)
    }

    fn stored_urls<S: IndexStore>(coordinator: &Coordinator<S>) -> Vec<String> {
        coordinator.store().urls().unwrap()
    }

    fn filter_scenario_site() -> MockSite {
        MockSite::new()
            .html(
                "/",
                r#"<html><head><title>Home</title></head><body>
                    <a href="/a">A</a> <a href="/b">B</a>
                    <a href="https://other.com/x">Other</a> <a href="/a?date=1">Dated</a>
                </body></html>"#,
            )
            .html("/a", "<title>A</title><p>alpha</p>")
            .html("/b", "<title>B</title><p>bravo</p>")
            .html("/a?date=1", "<title>Dated</title>")
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let site = Arc::new(filter_scenario_site());
        let mut coordinator = coordinator(config(&[r"#date\=#i"]), Arc::clone(&site), IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(
            stored_urls(&coordinator),
            vec!["https://example.com/", "https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(stats.pages_visited, 3);
        assert_eq!(stats.pages_indexed, 3);
        assert_eq!(stats.pages_filtered, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.outcome, RunStatus::Completed);
        assert_eq!(site.fetch_count("/a?date=1"), 0);
        assert_eq!(coordinator.phase(), CrawlPhase::Done);
    }

    #[tokio::test]
    async fn test_stored_documents_are_eligible() {
        let site = Arc::new(filter_scenario_site());
        let config = config(&[r"#date\=#i"]);
        let filter = config.filter().clone();
        let mut coordinator = coordinator(config, site, IndexerRegistry::new());

        coordinator.run().await.unwrap();

        for url in stored_urls(&coordinator) {
            assert!(filter.is_eligible(&url), "{} should be eligible", url);
        }
    }

    #[tokio::test]
    async fn test_http_error_is_counted_and_skipped() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/a">A</a><a href="/b">B</a>"#)
                .html("/a", "<p>alpha</p>")
                .page("/b", Page::Status(500)),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(
            stored_urls(&coordinator),
            vec!["https://example.com/", "https://example.com/a"]
        );
        assert_eq!(site.fetch_count("/b"), 1);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.outcome, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_indexer_document_without_hyperlink() {
        let site = Arc::new(MockSite::new().html("/", "<p>home</p>"));
        let indexers = IndexerRegistry::new().with(
            StaticIndexer::new("records")
                .with_document(IndexDocument::new("https://example.com/synthetic-1", "Record", "synthetic body"))
                .unwrap(),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), indexers);

        let stats = coordinator.run().await.unwrap();

        let document = coordinator.store().get("https://example.com/synthetic-1").unwrap();
        assert_eq!(document.unwrap().body, "synthetic body");
        assert_eq!(stats.pages_provided, 1);
        assert_eq!(site.fetch_count("/synthetic-1"), 0);
    }

    #[tokio::test]
    async fn test_provided_document_is_authoritative() {
        let site = Arc::new(MockSite::new().html("/", r#"<a href="/page">p</a>"#).html("/page", "<p>fetched</p>"));
        let indexers = IndexerRegistry::new().with(
            StaticIndexer::new("records")
                .with_document(IndexDocument::new("https://example.com/page", "Provided", "from indexer"))
                .unwrap(),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), indexers);

        coordinator.run().await.unwrap();

        let document = coordinator.store().get("https://example.com/page").unwrap().unwrap();
        assert_eq!(document.title, "Provided");
        assert_eq!(site.fetch_count("/page"), 0);
    }

    #[tokio::test]
    async fn test_indexer_urls_bypass_containment_but_not_filters() {
        let site = Arc::new(MockSite::new().html("/", "<p>home</p>"));
        let indexers = IndexerRegistry::new().with(
            StaticIndexer::new("records")
                .with_document(IndexDocument::new("https://data.example.org/record", "Record", "r"))
                .unwrap()
                .with_document(IndexDocument::new("https://example.com/old?date=2020", "Old", "o"))
                .unwrap(),
        );
        let mut coordinator = coordinator(config(&[r"#date\=#i"]), site, indexers);

        let stats = coordinator.run().await.unwrap();

        assert!(coordinator.store().get("https://data.example.org/record").unwrap().is_some());
        assert!(coordinator.store().get("https://example.com/old?date=2020").unwrap().is_none());
        assert_eq!(stats.pages_filtered, 1);
    }

    #[tokio::test]
    async fn test_each_url_fetched_once_with_workers() {
        let site = MockSite {
            delay: Some(Duration::from_millis(10)),
            ..MockSite::new()
        };
        let mut site = site.html("/", r#"<a href="/p0">0</a><a href="/p1">1</a><a href="/p2">2</a>"#);
        for i in 0..3 {
            site = site.html(
                &format!("/p{}", i),
                r#"<a href="/">home</a><a href="/p0">0</a><a href="/p1">1</a><a href="/p2">2</a><a href="/p0/">0 again</a>"#,
            );
        }
        let site = Arc::new(site);

        let mut coordinator = coordinator(
            config(&[]).with_max_concurrent_fetches(2),
            Arc::clone(&site),
            IndexerRegistry::new(),
        );
        let stats = coordinator.run().await.unwrap();

        for path in ["/", "/p0", "/p1", "/p2"] {
            assert_eq!(site.fetch_count(path), 1, "{} fetched more than once", path);
        }
        assert_eq!(stats.pages_visited, 4);
        assert!(site.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(coordinator.frontier().visited_count(), 4);
    }

    #[tokio::test]
    async fn test_single_worker_is_fifo() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/b">b</a><a href="/a">a</a>"#)
                .html("/b", r#"<a href="/c">c</a>"#)
                .html("/a", "<p>a</p>")
                .html("/c", "<p>c</p>"),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new());
        let stats = coordinator.run().await.unwrap();

        assert_eq!(site.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(stats.depth_breakdown.get(&0), Some(&1));
        assert_eq!(stats.depth_breakdown.get(&1), Some(&2));
        assert_eq!(stats.depth_breakdown.get(&2), Some(&1));

        let c = coordinator.store().get("https://example.com/c").unwrap().unwrap();
        assert_eq!(c.referrer.as_deref(), Some("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let site = Arc::new(filter_scenario_site());
        let token = CancellationToken::new();
        token.cancel();

        let mut coordinator =
            coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new()).with_cancellation(token);
        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.outcome, RunStatus::Cancelled);
        assert_eq!(stats.pages_visited, 0);
        assert_eq!(site.total_fetches(), 0);
    }

    /// Indexer whose discovery takes far longer than the test allows
    struct StalledIndexer;

    #[async_trait]
    impl CrawlIndexer for StalledIndexer {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn discover_urls(&self) -> Result<Vec<String>, IndexerError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec!["https://example.com/late".to_string()])
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_indexer_discovery() {
        let site = Arc::new(filter_scenario_site());
        let token = CancellationToken::new();
        let indexers = IndexerRegistry::new().with(StalledIndexer);
        let mut coordinator =
            coordinator(config(&[]), Arc::clone(&site), indexers).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
            .await
            .expect("cancellation should interrupt discovery")
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(stats.outcome, RunStatus::Cancelled);
        assert_eq!(stats.pages_visited, 0);
        assert_eq!(site.total_fetches(), 0);
        assert_eq!(coordinator.phase(), CrawlPhase::Done);

        let run = coordinator.store().latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_fetch_finish() {
        let token = CancellationToken::new();
        let site = MockSite {
            cancel_on_fetch: Some(token.clone()),
            ..filter_scenario_site()
        };
        let site = Arc::new(site);

        let mut coordinator =
            coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new()).with_cancellation(token);
        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.outcome, RunStatus::Cancelled);
        assert_eq!(stats.pages_visited, 1);
        assert_eq!(stored_urls(&coordinator), vec!["https://example.com/"]);

        let run = coordinator.store().latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_store_errors_are_counted() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/a">A</a><a href="/b">B</a>"#)
                .html("/a", "<p>a</p>")
                .html("/b", "<p>b</p>"),
        );
        let store = FlakyStore::new(&["https://example.com/a"], false);
        let mut coordinator = Coordinator::new(config(&[]), store, site, IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.store_errors, 1);
        assert_eq!(stats.pages_indexed, 2);
        assert_eq!(stats.outcome, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts_with_partial_stats() {
        let site = Arc::new(filter_scenario_site());
        let store = FlakyStore::new(&["*"], true);
        let mut coordinator = Coordinator::new(config(&[]), store, site, IndexerRegistry::new());

        match coordinator.run().await {
            Err(SiteSearchError::StoreUnavailable { stats, .. }) => {
                assert_eq!(stats.outcome, RunStatus::Aborted);
                assert_eq!(stats.store_errors, 1);
                assert_eq!(stats.pages_indexed, 0);
            }
            other => panic!("expected StoreUnavailable, got {:?}", other.map(|s| s.outcome)),
        }
        assert_eq!(coordinator.phase(), CrawlPhase::Done);
    }

    #[tokio::test]
    async fn test_repeated_store_failures_abort() {
        let mut site = MockSite::new().html(
            "/",
            r#"<a href="/1">1</a><a href="/2">2</a><a href="/3">3</a><a href="/4">4</a><a href="/5">5</a>"#,
        );
        for i in 1..=5 {
            site = site.html(&format!("/{}", i), "<p>x</p>");
        }
        let store = FlakyStore::new(&["*"], false);
        let mut coordinator = Coordinator::new(config(&[]), store, Arc::new(site), IndexerRegistry::new());

        match coordinator.run().await {
            Err(SiteSearchError::StoreUnavailable { stats, .. }) => {
                assert_eq!(stats.store_errors, MAX_CONSECUTIVE_STORE_FAILURES as u64);
            }
            other => panic!("expected StoreUnavailable, got {:?}", other.map(|s| s.outcome)),
        }
    }

    #[tokio::test]
    async fn test_redirect_is_keyed_by_final_url() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/old">old</a><a href="/new">new</a>"#)
                .page("/old", Page::Redirect("/new"))
                .html("/new", "<title>New</title>"),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new());

        coordinator.run().await.unwrap();

        assert_eq!(
            stored_urls(&coordinator),
            vec!["https://example.com/", "https://example.com/new"]
        );
        assert_eq!(site.fetch_count("/new"), 0);
    }

    #[tokio::test]
    async fn test_redirect_outside_base_is_skipped() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/away">away</a>"#)
                .page("/away", Page::Redirect("https://other.com/")),
        );
        let mut coordinator = coordinator(config(&[]), site, IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stored_urls(&coordinator), vec!["https://example.com/"]);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_non_html_is_skipped() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/file.pdf">pdf</a>"#)
                .page("/file.pdf", Page::Binary("application/pdf")),
        );
        let mut coordinator = coordinator(config(&[]), site, IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.non_html_skipped, 1);
        assert_eq!(stored_urls(&coordinator), vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_page_is_indexed_without_links() {
        let mut body = b"<title>Caf</title><p>caf".to_vec();
        body.push(0xff);
        body.extend_from_slice(br#" menu</p><a href="/next">next</a>"#);

        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<a href="/broken">broken</a>"#)
                .page("/broken", Page::Bytes(body))
                .html("/next", "<p>next</p>"),
        );
        let mut coordinator = coordinator(config(&[]), Arc::clone(&site), IndexerRegistry::new());

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(site.fetch_count("/next"), 0);

        let document = coordinator.store().get("https://example.com/broken").unwrap().unwrap();
        assert!(document.body.contains("menu"));
        assert!(document.links.is_empty());
        assert_eq!(
            stored_urls(&coordinator),
            vec!["https://example.com/", "https://example.com/broken"]
        );
    }

    #[tokio::test]
    async fn test_full_ignore_page_links_are_followed() {
        let site = Arc::new(
            MockSite::new()
                .html("/", r#"<!-- [CRAWL_FULL_IGNORE] --><a href="/a">a</a>"#)
                .html("/a", "<p>a</p>"),
        );
        let mut coordinator = coordinator(config(&[]), site, IndexerRegistry::new());

        coordinator.run().await.unwrap();

        assert_eq!(stored_urls(&coordinator), vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_stale_documents_are_pruned() {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        store
            .upsert(&IndexDocument::new("https://example.com/gone", "Gone", "old"))
            .unwrap();

        let site = Arc::new(MockSite::new().html("/", "<p>home</p>"));
        let mut coordinator = Coordinator::new(config(&[]), store, site, IndexerRegistry::new());
        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.documents_removed, 1);
        assert_eq!(stored_urls(&coordinator), vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn test_no_pruning_when_disabled_or_cancelled() {
        let seeded = || {
            let mut store = SqliteStorage::open_in_memory().unwrap();
            store
                .upsert(&IndexDocument::new("https://example.com/gone", "Gone", "old"))
                .unwrap();
            store
        };
        let site = Arc::new(MockSite::new().html("/", "<p>home</p>"));

        let mut disabled = Coordinator::new(
            config(&[]).with_prune_stale(false),
            seeded(),
            Arc::clone(&site) as Arc<dyn PageFetcher>,
            IndexerRegistry::new(),
        );
        disabled.run().await.unwrap();
        assert!(disabled.store().get("https://example.com/gone").unwrap().is_some());

        let token = CancellationToken::new();
        token.cancel();
        let mut cancelled =
            Coordinator::new(config(&[]), seeded(), site, IndexerRegistry::new()).with_cancellation(token);
        let stats = cancelled.run().await.unwrap();
        assert_eq!(stats.documents_removed, 0);
        assert!(cancelled.store().get("https://example.com/gone").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_twice_is_invalid_transition() {
        let site = Arc::new(MockSite::new().html("/", "<p>home</p>"));
        let mut coordinator = coordinator(config(&[]), site, IndexerRegistry::new());

        coordinator.run().await.unwrap();
        assert!(matches!(
            coordinator.run().await,
            Err(SiteSearchError::InvalidTransition {
                from: CrawlPhase::Done,
                to: CrawlPhase::Seeding
            })
        ));
    }

    #[tokio::test]
    async fn test_run_record_is_completed() {
        let site = Arc::new(filter_scenario_site());
        let mut coordinator =
            coordinator(config(&[]), site, IndexerRegistry::new()).with_config_hash("cafe");

        let stats = coordinator.run().await.unwrap();

        let run = coordinator.store().get_run(stats.run_id.unwrap()).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.config_hash, "cafe");
        assert_eq!(run.pages_indexed, stats.pages_indexed);
    }

    #[tokio::test]
    async fn test_stalled_fetch_is_network_error() {
        let site = MockSite {
            delay: Some(Duration::from_secs(5)),
            ..MockSite::new().html("/", "<p>slow</p>")
        };
        let mut coordinator = coordinator(
            config(&[]).with_request_timeout(Duration::from_millis(50)),
            Arc::new(site),
            IndexerRegistry::new(),
        );

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.errors, 1);
        assert!(stats.failures[0].reason.contains("timeout"));
    }
}
