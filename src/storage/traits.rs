//! Storage traits and error types
//!
//! The crawl engine only writes through [`PersistenceSink`]. Reporting reads
//! live in [`SessionReader`] so test sinks need not implement them.

use crate::config::CrawlTarget;
use crate::state::SessionStatus;
use crate::storage::{
    CrawledUrlRow, OutcomeRecord, SessionMetrics, SessionRecord, StatsSummary, SubdomainRow,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Invalid query condition: {0}")]
    InvalidCondition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Write side of the storage backend, consumed by the crawl engine
pub trait PersistenceSink: Send {
    // ===== Session Lifecycle =====

    /// Allocates a new session for a crawl target
    ///
    /// # Returns
    ///
    /// The ID of the newly created session
    fn start_session(&mut self, target: &CrawlTarget) -> StorageResult<i64>;

    /// Finalizes a session with its status and metrics
    ///
    /// # Arguments
    ///
    /// * `session_id` - The session to finalize
    /// * `metrics` - Metrics computed at session end
    /// * `status` - Terminal status
    /// * `error_message` - Error captured for failed sessions
    fn complete_session(
        &mut self,
        session_id: i64,
        metrics: &SessionMetrics,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    // ===== Record Logging =====

    /// Persists a batch of outcome records
    ///
    /// Records already stored for the same session and URL are ignored.
    ///
    /// # Returns
    ///
    /// Number of rows actually inserted
    fn log_url_batch(&mut self, session_id: i64, records: &[OutcomeRecord])
        -> StorageResult<usize>;

    /// Records a subdomain sighting, incrementing its per-session count
    ///
    /// # Returns
    ///
    /// The subdomain row ID
    fn log_subdomain(
        &mut self,
        session_id: i64,
        subdomain: &str,
        base_domain: &str,
    ) -> StorageResult<i64>;
}

/// Read-only reporting queries
pub trait SessionReader {
    /// Gets a session by ID
    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>>;

    /// Gets the metrics stored when a session completed
    fn get_session_metrics(&self, session_id: i64) -> StorageResult<Option<SessionMetrics>>;

    /// Gets outcome rows for a session in discovery order
    fn get_session_urls(
        &self,
        session_id: i64,
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<CrawledUrlRow>>;

    /// Gets subdomains for a session, most referenced first
    fn get_session_subdomains(&self, session_id: i64) -> StorageResult<Vec<SubdomainRow>>;

    /// Gets the most recently started sessions
    fn get_recent_sessions(&self, limit: usize) -> StorageResult<Vec<SessionRecord>>;

    /// Gets totals across all sessions
    fn get_stats_summary(&self) -> StorageResult<StatsSummary>;
}
