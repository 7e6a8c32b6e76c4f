//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the persistence
//! sink and the reporting reader.

use crate::config::CrawlTarget;
use crate::state::SessionStatus;
use crate::storage::condition::{render_conditions, Condition};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PersistenceSink, SessionReader, StorageError, StorageResult};
use crate::storage::{
    truncate_message, CrawledUrlRow, OutcomeRecord, SessionExport, SessionMetrics, SessionRecord,
    StatsSummary, SubdomainRow,
};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const SESSION_COLUMNS: &str = "id, target_url, started_at, completed_at, max_depth, workers, \
     rate_limit, timeout, user_agent, proxy, status, error_message";

const URL_COLUMNS: &str = "id, session_id, url, normalized_url, domain, path, depth, \
     status_code, content_type, response_time_ms, discovered_at, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Queries a session's outcome rows with typed conditions
    ///
    /// # Arguments
    ///
    /// * `session_id` - The session to query
    /// * `conditions` - Predicates joined with `AND`
    /// * `limit` - Optional maximum number of rows
    /// * `offset` - Number of matching rows to skip
    pub fn query_urls(
        &self,
        session_id: i64,
        conditions: &[Condition],
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<CrawledUrlRow>> {
        let (clause, mut values) = render_conditions(conditions)?;

        let mut sql = format!(
            "SELECT {} FROM crawled_urls WHERE session_id = ?",
            URL_COLUMNS
        );
        let mut bound = vec![Value::Integer(session_id)];
        if !clause.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&clause);
            bound.append(&mut values);
        }
        sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");
        bound.push(Value::Integer(limit.map_or(-1, |l| l as i64)));
        bound.push(Value::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bound.iter()), url_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Gathers everything stored for one session
    ///
    /// # Returns
    ///
    /// * `Ok(SessionExport)` - Session row, metrics, outcomes and subdomains
    /// * `Err(StorageError::SessionNotFound)` - No such session
    pub fn export_session(&self, session_id: i64) -> StorageResult<SessionExport> {
        let session = self
            .get_session(session_id)?
            .ok_or(StorageError::SessionNotFound(session_id))?;

        Ok(SessionExport {
            session,
            metrics: self.get_session_metrics(session_id)?,
            urls: self.get_session_urls(session_id, None, 0)?,
            subdomains: self.get_session_subdomains(session_id)?,
        })
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(10)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        target_url: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        max_depth: row.get(4)?,
        workers: row.get(5)?,
        rate_limit: row.get(6)?,
        timeout: row.get::<_, i64>(7)? as u64,
        user_agent: row.get(8)?,
        proxy: row.get(9)?,
        status: SessionStatus::from_db_string(&status).unwrap_or(SessionStatus::Running),
        error_message: row.get(11)?,
    })
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<CrawledUrlRow> {
    Ok(CrawledUrlRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        url: row.get(2)?,
        normalized_url: row.get(3)?,
        domain: row.get(4)?,
        path: row.get(5)?,
        depth: row.get(6)?,
        status_code: row.get(7)?,
        content_type: row.get(8)?,
        response_time_ms: row.get(9)?,
        discovered_at: row.get(10)?,
        error_message: row.get(11)?,
    })
}

impl PersistenceSink for SqliteStorage {
    // ===== Session Lifecycle =====

    fn start_session(&mut self, target: &CrawlTarget) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_sessions
                (target_url, started_at, max_depth, workers, rate_limit, timeout, user_agent, proxy, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                target.base_url.as_str(),
                now,
                target.max_depth,
                target.workers as i64,
                target.delay.as_secs_f64(),
                target.timeout.as_secs() as i64,
                target.user_agent,
                target.proxy,
                SessionStatus::Running.to_db_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_session(
        &mut self,
        session_id: i64,
        metrics: &SessionMetrics,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let error_message = error_message.map(truncate_message);

        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE crawl_sessions SET status = ?1, completed_at = ?2, error_message = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, error_message, session_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }

        tx.execute(
            "INSERT OR REPLACE INTO crawl_metrics
                (session_id, total_time_seconds, crawl_time_seconds, urls_visited, subdomains_found,
                 paths_found, errors_count, crawl_speed, avg_time_per_url, discovery_rate, completed_normally)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session_id,
                metrics.total_time_seconds,
                metrics.crawl_time_seconds,
                metrics.urls_visited as i64,
                metrics.subdomains_found as i64,
                metrics.paths_found as i64,
                metrics.errors_count as i64,
                metrics.crawl_speed,
                metrics.avg_time_per_url,
                metrics.discovery_rate,
                metrics.completed_normally,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ===== Record Logging =====

    fn log_url_batch(
        &mut self,
        session_id: i64,
        records: &[OutcomeRecord],
    ) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO crawled_urls
                    (session_id, url, normalized_url, domain, path, depth, status_code,
                     content_type, response_time_ms, discovered_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for record in records {
                inserted += stmt.execute(params![
                    session_id,
                    record.url,
                    record.normalized_url,
                    record.domain,
                    record.path,
                    record.depth,
                    record.status_code,
                    record.content_type,
                    record.response_time_ms,
                    now,
                    record.error_message.as_deref().map(truncate_message),
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn log_subdomain(
        &mut self,
        session_id: i64,
        subdomain: &str,
        base_domain: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO subdomains (session_id, subdomain, base_domain, first_seen, url_count)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(session_id, subdomain) DO UPDATE SET url_count = url_count + 1",
            params![session_id, subdomain, base_domain, now],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM subdomains WHERE session_id = ?1 AND subdomain = ?2",
            params![session_id, subdomain],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

impl SessionReader for SqliteStorage {
    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>> {
        let sql = format!("SELECT {} FROM crawl_sessions WHERE id = ?1", SESSION_COLUMNS);
        let session = self
            .conn
            .query_row(&sql, params![session_id], session_from_row)
            .optional()?;
        Ok(session)
    }

    fn get_session_metrics(&self, session_id: i64) -> StorageResult<Option<SessionMetrics>> {
        let metrics = self
            .conn
            .query_row(
                "SELECT total_time_seconds, crawl_time_seconds, urls_visited, subdomains_found,
                        paths_found, errors_count, crawl_speed, avg_time_per_url, discovery_rate,
                        completed_normally
                 FROM crawl_metrics WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionMetrics {
                        total_time_seconds: row.get(0)?,
                        crawl_time_seconds: row.get(1)?,
                        urls_visited: row.get::<_, i64>(2)? as u64,
                        subdomains_found: row.get::<_, i64>(3)? as u64,
                        paths_found: row.get::<_, i64>(4)? as u64,
                        errors_count: row.get::<_, i64>(5)? as u64,
                        crawl_speed: row.get(6)?,
                        avg_time_per_url: row.get(7)?,
                        discovery_rate: row.get(8)?,
                        completed_normally: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(metrics)
    }

    fn get_session_urls(
        &self,
        session_id: i64,
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<CrawledUrlRow>> {
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let sql = format!(
            "SELECT {} FROM crawled_urls WHERE session_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
            URL_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id, limit, offset as i64], url_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn get_session_subdomains(&self, session_id: i64) -> StorageResult<Vec<SubdomainRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT subdomain, base_domain, first_seen, url_count
             FROM subdomains WHERE session_id = ?1
             ORDER BY url_count DESC, subdomain",
        )?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(SubdomainRow {
                    subdomain: row.get(0)?,
                    base_domain: row.get(1)?,
                    first_seen: row.get(2)?,
                    url_count: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn get_recent_sessions(&self, limit: usize) -> StorageResult<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_sessions ORDER BY started_at DESC, id DESC LIMIT ?1",
            SESSION_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn get_stats_summary(&self) -> StorageResult<StatsSummary> {
        let count = |sql: &str| -> StorageResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StatsSummary {
            total_sessions: count("SELECT COUNT(*) FROM crawl_sessions")?,
            total_urls: count("SELECT COUNT(*) FROM crawled_urls")?,
            unique_subdomains: count("SELECT COUNT(DISTINCT subdomain) FROM subdomains")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConditionValue, Operator, UrlColumn};
    use url::Url;

    fn target() -> CrawlTarget {
        CrawlTarget::new(Url::parse("https://example.com/").unwrap())
    }

    fn outcome(url: &str, status: Option<u16>, error: Option<&str>) -> OutcomeRecord {
        let parsed = Url::parse(url).unwrap();
        OutcomeRecord {
            url: url.to_string(),
            normalized_url: url.to_string(),
            domain: parsed.host_str().unwrap().to_string(),
            path: parsed.path().to_string(),
            depth: 1,
            status_code: status,
            content_type: status.map(|_| "text/html".to_string()),
            response_time_ms: status.map(|_| 12.5),
            error_message: error.map(String::from),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_start_session() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();
        assert!(session_id > 0);

        let session = storage.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.target_url, "https://example.com/");
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.max_depth, 3);
        assert_eq!(session.workers, 5);
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn test_missing_session() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_session(42).unwrap().is_none());
        assert!(matches!(
            storage.export_session(42),
            Err(StorageError::SessionNotFound(42))
        ));
    }

    #[test]
    fn test_log_url_batch_ignores_duplicates() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        let batch = vec![
            outcome("https://example.com/", Some(200), None),
            outcome("https://example.com/about", Some(404), None),
        ];
        assert_eq!(storage.log_url_batch(session_id, &batch).unwrap(), 2);

        // Same URLs again plus one new
        let mut again = batch.clone();
        again.push(outcome("https://example.com/slow", None, Some("Request timeout")));
        assert_eq!(storage.log_url_batch(session_id, &again).unwrap(), 1);

        let rows = storage.get_session_urls(session_id, None, 0).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url, "https://example.com/");
        assert_eq!(rows[2].error_message.as_deref(), Some("Request timeout"));
    }

    #[test]
    fn test_log_url_batch_truncates_errors() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        let long = "e".repeat(400);
        let batch = vec![outcome("https://example.com/x", None, Some(&long))];
        storage.log_url_batch(session_id, &batch).unwrap();

        let rows = storage.get_session_urls(session_id, None, 0).unwrap();
        assert_eq!(rows[0].error_message.as_ref().unwrap().len(), 200);
    }

    #[test]
    fn test_log_subdomain_increments_count() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        let id1 = storage
            .log_subdomain(session_id, "api.example.com", "example.com")
            .unwrap();
        let id2 = storage
            .log_subdomain(session_id, "api.example.com", "example.com")
            .unwrap();
        storage
            .log_subdomain(session_id, "blog.example.com", "example.com")
            .unwrap();

        assert_eq!(id1, id2);

        let subdomains = storage.get_session_subdomains(session_id).unwrap();
        assert_eq!(subdomains.len(), 2);
        assert_eq!(subdomains[0].subdomain, "api.example.com");
        assert_eq!(subdomains[0].url_count, 2);
        assert_eq!(subdomains[1].url_count, 1);
    }

    #[test]
    fn test_complete_session_stores_metrics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        let metrics = SessionMetrics {
            total_time_seconds: 2.0,
            crawl_time_seconds: 1.5,
            urls_visited: 10,
            subdomains_found: 2,
            paths_found: 8,
            errors_count: 1,
            crawl_speed: 5.0,
            avg_time_per_url: 0.2,
            discovery_rate: 5.0,
            completed_normally: true,
        };
        storage
            .complete_session(session_id, &metrics, SessionStatus::Completed, None)
            .unwrap();

        let session = storage.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());

        let loaded = storage.get_session_metrics(session_id).unwrap().unwrap();
        assert_eq!(loaded, metrics);

        // Completing again replaces the metrics row
        let failed = SessionMetrics {
            completed_normally: false,
            ..metrics
        };
        storage
            .complete_session(session_id, &failed, SessionStatus::Failed, Some("boom"))
            .unwrap();
        let loaded = storage.get_session_metrics(session_id).unwrap().unwrap();
        assert!(!loaded.completed_normally);
        let session = storage.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_complete_unknown_session() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.complete_session(
            7,
            &SessionMetrics::default(),
            SessionStatus::Completed,
            None,
        );
        assert!(matches!(result, Err(StorageError::SessionNotFound(7))));
    }

    #[test]
    fn test_get_session_urls_paging() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        let batch: Vec<_> = (0..5)
            .map(|i| outcome(&format!("https://example.com/p{}", i), Some(200), None))
            .collect();
        storage.log_url_batch(session_id, &batch).unwrap();

        let page = storage.get_session_urls(session_id, Some(2), 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].url, "https://example.com/p2");
        assert_eq!(page[1].url, "https://example.com/p3");
    }

    #[test]
    fn test_query_urls_with_conditions() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();

        storage
            .log_url_batch(
                session_id,
                &[
                    outcome("https://example.com/", Some(200), None),
                    outcome("https://example.com/missing", Some(404), None),
                    outcome("https://example.com/slow", None, Some("Request timeout")),
                ],
            )
            .unwrap();

        let errors = storage
            .query_urls(
                session_id,
                &[Condition::is_not_null(UrlColumn::ErrorMessage)],
                None,
                0,
            )
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.as_deref(), Some("/slow"));

        let client_errors = storage
            .query_urls(
                session_id,
                &[Condition::new(
                    UrlColumn::StatusCode,
                    Operator::Ge,
                    ConditionValue::Integer(400),
                )],
                Some(10),
                0,
            )
            .unwrap();
        assert_eq!(client_errors.len(), 1);
        assert_eq!(client_errors[0].status_code, Some(404));
    }

    #[test]
    fn test_recent_sessions_and_summary() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.start_session(&target()).unwrap();
        let second = storage.start_session(&target()).unwrap();

        storage
            .log_url_batch(first, &[outcome("https://example.com/", Some(200), None)])
            .unwrap();
        storage
            .log_url_batch(second, &[outcome("https://example.com/", Some(200), None)])
            .unwrap();
        storage
            .log_subdomain(first, "api.example.com", "example.com")
            .unwrap();
        storage
            .log_subdomain(second, "api.example.com", "example.com")
            .unwrap();

        let recent = storage.get_recent_sessions(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second);

        let summary = storage.get_stats_summary().unwrap();
        assert_eq!(
            summary,
            StatsSummary {
                total_sessions: 2,
                total_urls: 2,
                unique_subdomains: 1,
            }
        );
    }

    #[test]
    fn test_export_session() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session_id = storage.start_session(&target()).unwrap();
        storage
            .log_url_batch(session_id, &[outcome("https://example.com/", Some(200), None)])
            .unwrap();
        storage
            .log_subdomain(session_id, "api.example.com", "example.com")
            .unwrap();

        let export = storage.export_session(session_id).unwrap();
        assert_eq!(export.session.id, session_id);
        assert!(export.metrics.is_none());
        assert_eq!(export.urls.len(), 1);
        assert_eq!(export.subdomains.len(), 1);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["session"]["status"], "running");
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("subtrace.db");

        let session_id = {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.start_session(&target()).unwrap()
        };

        let storage = SqliteStorage::new(&path).unwrap();
        assert!(storage.get_session(session_id).unwrap().is_some());
    }
}
