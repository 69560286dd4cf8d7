//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the IndexStore trait.

use crate::output::CrawlStats;
use crate::storage::schema::initialize_schema;
use crate::storage::search::{excerpt, paginate, score, tokenize, SearchHit, SearchPage};
use crate::storage::traits::{IndexStore, StorageError, StorageResult};
use crate::storage::{IndexDocument, RunRecord, RunStatus};
use crate::url::normalize_url;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

/// Default number of search results per page
pub const DEFAULT_PAGE_SIZE: usize = 25;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, pages_visited,
     pages_indexed, pages_filtered, errors, store_errors, documents_removed";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    page_size: usize,
}

impl SqliteStorage {
    /// Opens (or creates) the index database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Creates an in-memory index, discarded when dropped
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Sets the number of results per search page (at least one)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn document_key(url: &str) -> StorageResult<String> {
        normalize_url(url)
            .map(|u| u.to_string())
            .map_err(|e| StorageError::InvalidKey(format!("{}: {}", url, e)))
    }

    fn load_links(&self, url: &str) -> StorageResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT target_url FROM document_links WHERE document_url = ?1")?;

        let links = stmt
            .query_map(params![url], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(links)
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        pages_visited: row.get::<_, i64>(5)? as u64,
        pages_indexed: row.get::<_, i64>(6)? as u64,
        pages_filtered: row.get::<_, i64>(7)? as u64,
        errors: row.get::<_, i64>(8)? as u64,
        store_errors: row.get::<_, i64>(9)? as u64,
        documents_removed: row.get::<_, i64>(10)? as u64,
    })
}

impl IndexStore for SqliteStorage {
    // ===== Documents =====

    fn upsert(&mut self, document: &IndexDocument) -> StorageResult<()> {
        let key = Self::document_key(&document.url)?;
        let content_hash = document.content_hash();
        let crawled_at = document.crawled_at.to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO documents
             (url, title, description, language, body, status, referrer, content_hash, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                language = excluded.language,
                body = excluded.body,
                status = excluded.status,
                referrer = excluded.referrer,
                content_hash = excluded.content_hash,
                crawled_at = excluded.crawled_at",
            params![
                key,
                document.title,
                document.description,
                document.language,
                document.body,
                document.status,
                document.referrer,
                content_hash,
                crawled_at,
            ],
        )?;

        tx.execute(
            "DELETE FROM document_links WHERE document_url = ?1",
            params![key],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO document_links (document_url, target_url) VALUES (?1, ?2)",
            )?;
            for link in &document.links {
                insert.execute(params![key, link])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get(&self, url: &str) -> StorageResult<Option<IndexDocument>> {
        let key = Self::document_key(url)?;

        let row = self
            .conn
            .query_row(
                "SELECT url, title, description, language, body, status, referrer, crawled_at
                 FROM documents WHERE url = ?1",
                params![key],
                |row| {
                    Ok((
                        IndexDocument {
                            url: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            language: row.get(3)?,
                            body: row.get(4)?,
                            status: row.get(5)?,
                            referrer: row.get(6)?,
                            crawled_at: Utc::now(),
                            links: BTreeSet::new(),
                        },
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut document, crawled_at)) => {
                document.crawled_at = parse_timestamp(&crawled_at)?;
                document.links = self.load_links(&key)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    fn remove(&mut self, url: &str) -> StorageResult<bool> {
        let key = Self::document_key(url)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM document_links WHERE document_url = ?1",
            params![key],
        )?;
        let removed = tx.execute("DELETE FROM documents WHERE url = ?1", params![key])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM documents ORDER BY url")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }

    // ===== Search =====

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn search(&self, query: &str, page: usize) -> StorageResult<SearchPage> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(paginate(query, Vec::new(), page, self.page_size));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT url, title, description, body FROM documents")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (url, title, description, body) = row?;
            let relevance = score(&tokens, &title, &body);
            if relevance == 0 {
                continue;
            }
            hits.push(SearchHit {
                excerpt: excerpt(&body, &tokens),
                url,
                title,
                description,
                score: relevance,
            });
        }

        Ok(paginate(query, hits, page, self.page_size))
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(&mut self, run_id: i64, stats: &CrawlStats) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_visited = ?3,
             pages_indexed = ?4, pages_filtered = ?5, errors = ?6, store_errors = ?7,
             documents_removed = ?8 WHERE id = ?9",
            params![
                stats.outcome.to_db_string(),
                stats.finished_at.to_rfc3339(),
                stats.pages_visited as i64,
                stats.pages_indexed as i64,
                stats.pages_filtered as i64,
                stats.errors as i64,
                stats.store_errors as i64,
                stats.documents_removed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}
