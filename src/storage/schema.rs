//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Subtrace database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl session
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    max_depth INTEGER NOT NULL DEFAULT 3,
    workers INTEGER NOT NULL DEFAULT 5,
    rate_limit REAL NOT NULL DEFAULT 0.5,
    timeout INTEGER NOT NULL DEFAULT 5,
    user_agent TEXT,
    proxy TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    error_message TEXT
);

-- One row per fetch attempt
CREATE TABLE IF NOT EXISTS crawled_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES crawl_sessions(id),
    url TEXT NOT NULL,
    normalized_url TEXT,
    domain TEXT,
    path TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    content_type TEXT,
    response_time_ms REAL,
    discovered_at TEXT NOT NULL,
    error_message TEXT,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_urls_session ON crawled_urls(session_id);
CREATE INDEX IF NOT EXISTS idx_urls_domain ON crawled_urls(domain);
CREATE INDEX IF NOT EXISTS idx_urls_depth ON crawled_urls(depth);

-- Distinct subdomains per session with a sighting count
CREATE TABLE IF NOT EXISTS subdomains (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES crawl_sessions(id),
    subdomain TEXT NOT NULL,
    base_domain TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    url_count INTEGER NOT NULL DEFAULT 1,
    UNIQUE(session_id, subdomain)
);

CREATE INDEX IF NOT EXISTS idx_subdomains_session ON subdomains(session_id);
CREATE INDEX IF NOT EXISTS idx_subdomains_domain ON subdomains(base_domain);

-- Final metrics, one row per completed session
CREATE TABLE IF NOT EXISTS crawl_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL UNIQUE REFERENCES crawl_sessions(id),
    total_time_seconds REAL NOT NULL,
    crawl_time_seconds REAL NOT NULL,
    urls_visited INTEGER NOT NULL DEFAULT 0,
    subdomains_found INTEGER NOT NULL DEFAULT 0,
    paths_found INTEGER NOT NULL DEFAULT 0,
    errors_count INTEGER NOT NULL DEFAULT 0,
    crawl_speed REAL NOT NULL,
    avg_time_per_url REAL NOT NULL,
    discovery_rate REAL NOT NULL,
    completed_normally INTEGER NOT NULL DEFAULT 1
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
