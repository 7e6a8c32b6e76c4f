//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Session lifecycle and metrics persistence
//! - Batched URL outcome logging and subdomain counting
//! - Read-only reporting queries

mod condition;
mod schema;
mod sqlite;
mod traits;

pub use condition::{Condition, ConditionValue, Operator, UrlColumn};
pub use sqlite::SqliteStorage;
pub use traits::{PersistenceSink, SessionReader, StorageError, StorageResult};

use crate::state::SessionStatus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Maximum length of error messages stored with records
pub const MAX_ERROR_LEN: usize = 200;

/// A persistence sink shared between the buffer pipeline and the controller
pub type SharedSink = Arc<Mutex<dyn PersistenceSink>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a sink so it can be shared across tasks
pub fn share<S: PersistenceSink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Caps an error message at [`MAX_ERROR_LEN`] characters
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// One fetch attempt, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub path: String,
    pub depth: u32,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub response_time_ms: Option<f64>,
    pub error_message: Option<String>,
}

impl OutcomeRecord {
    /// Counts as an error when it carries a message or a non-2xx status
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
            || self
                .status_code
                .map(|code| !(200..300).contains(&code))
                .unwrap_or(true)
    }
}

/// A distinct subdomain discovered during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub subdomain: String,
    pub base_domain: String,
}

/// Metrics computed once at session end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_time_seconds: f64,
    pub crawl_time_seconds: f64,
    pub urls_visited: u64,
    pub subdomains_found: u64,
    pub paths_found: u64,
    pub errors_count: u64,
    /// URLs per second
    pub crawl_speed: f64,
    pub avg_time_per_url: f64,
    /// Subdomains plus paths per second
    pub discovery_rate: f64,
    pub completed_normally: bool,
}

/// Represents a crawl session row
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub target_url: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub max_depth: u32,
    pub workers: u32,
    pub rate_limit: f64,
    pub timeout: u64,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
}

/// Represents a persisted outcome row
#[derive(Debug, Clone, Serialize)]
pub struct CrawledUrlRow {
    pub id: i64,
    pub session_id: i64,
    pub url: String,
    pub normalized_url: Option<String>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub depth: u32,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub response_time_ms: Option<f64>,
    pub discovered_at: String,
    pub error_message: Option<String>,
}

/// Represents a persisted subdomain row
#[derive(Debug, Clone, Serialize)]
pub struct SubdomainRow {
    pub subdomain: String,
    pub base_domain: String,
    pub first_seen: String,
    pub url_count: u64,
}

/// Totals across every session in the database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub total_sessions: u64,
    pub total_urls: u64,
    pub unique_subdomains: u64,
}

/// Everything stored for one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionExport {
    pub session: SessionRecord,
    pub metrics: Option<SessionMetrics>,
    pub urls: Vec<CrawledUrlRow>,
    pub subdomains: Vec<SubdomainRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: Option<u16>, error: Option<&str>) -> OutcomeRecord {
        OutcomeRecord {
            url: "https://example.com/".to_string(),
            normalized_url: "https://example.com/".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            depth: 0,
            status_code: status,
            content_type: None,
            response_time_ms: None,
            error_message: error.map(String::from),
        }
    }

    #[test]
    fn test_outcome_is_error() {
        assert!(!record(Some(200), None).is_error());
        assert!(!record(Some(204), None).is_error());
        assert!(record(Some(404), None).is_error());
        assert!(record(None, Some("Request timeout")).is_error());
        assert!(record(Some(200), Some("Body read error")).is_error());
    }

    #[test]
    fn test_truncate_message() {
        let long = "x".repeat(500);
        assert_eq!(truncate_message(&long).len(), MAX_ERROR_LEN);
        assert_eq!(truncate_message("short"), "short");
    }

    #[test]
    fn test_truncate_multibyte() {
        let long = "é".repeat(300);
        assert_eq!(truncate_message(&long).chars().count(), MAX_ERROR_LEN);
    }
}
