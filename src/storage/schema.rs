//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Sitesearch index.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_visited INTEGER NOT NULL DEFAULT 0,
    pages_indexed INTEGER NOT NULL DEFAULT 0,
    pages_filtered INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    store_errors INTEGER NOT NULL DEFAULT 0,
    documents_removed INTEGER NOT NULL DEFAULT 0
);

-- Indexed documents, keyed by normalized URL
CREATE TABLE IF NOT EXISTS documents (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    language TEXT,
    body TEXT NOT NULL,
    status INTEGER NOT NULL,
    referrer TEXT,
    content_hash TEXT NOT NULL,
    crawled_at TEXT NOT NULL
);

-- Outbound links found on each document
CREATE TABLE IF NOT EXISTS document_links (
    document_url TEXT NOT NULL REFERENCES documents(url) ON DELETE CASCADE,
    target_url TEXT NOT NULL,
    PRIMARY KEY (document_url, target_url)
);

CREATE INDEX IF NOT EXISTS idx_document_links_target ON document_links(target_url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
