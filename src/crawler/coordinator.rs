//! Session controller - lifecycle of one crawl session
//!
//! This module ties the crawl together:
//! - Allocating the session through the persistence sink
//! - Building the discovery state, buffer pipeline and HTTP client
//! - Running the periodic flush task alongside the frontier scheduler
//! - Computing metrics and finalizing the session in a terminal state

use crate::buffer::BufferPipeline;
use crate::config::{CrawlTarget, StorageOptions};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::scheduler::{FrontierEntry, FrontierScheduler, ProgressFn};
use crate::crawler::worker::WorkerContext;
use crate::crawler::CancelFlag;
use crate::state::{DiscoveryState, ProgressSnapshot, SessionStatus};
use crate::storage::{SessionMetrics, SharedSink};
use crate::CrawlError;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Buffer settings for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Buffer length that triggers a flush
    pub buffer_size: usize,
    /// Directory for recovery mirror files
    pub buffer_dir: PathBuf,
    /// Period of the background flush check
    pub flush_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&StorageOptions::default())
    }
}

impl From<&StorageOptions> for SessionOptions {
    fn from(storage: &StorageOptions) -> Self {
        Self {
            buffer_size: storage.buffer_size,
            buffer_dir: storage.buffer_dir.clone(),
            flush_interval: storage.flush_interval,
        }
    }
}

/// Discovered items of a session, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlResults {
    pub subdomains: Vec<String>,
    pub paths: Vec<String>,
    pub visited_urls: Vec<String>,
}

impl CrawlResults {
    fn from_state(state: &DiscoveryState) -> Self {
        Self {
            subdomains: state.subdomains(),
            paths: state.paths(),
            visited_urls: state.visited_urls(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.visited_urls.is_empty()
    }
}

/// Terminal result of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Sink-assigned ID, absent if the session could not be allocated
    pub session_id: Option<i64>,
    pub status: SessionStatus,
    pub results: CrawlResults,
    pub metrics: SessionMetrics,
    pub error: Option<String>,
}

/// Drives one crawl session from `Queued` to a terminal state
pub struct SessionController {
    target: Arc<CrawlTarget>,
    sink: SharedSink,
    options: SessionOptions,
    client: Option<Client>,
    progress: Arc<ProgressFn>,
    cancel: CancelFlag,
    state: Arc<DiscoveryState>,
    status: SessionStatus,
}

impl SessionController {
    /// Creates a queued session
    ///
    /// # Arguments
    ///
    /// * `target` - What to crawl and how
    /// * `sink` - Persistence sink receiving records and the final metrics
    /// * `options` - Buffer threshold, mirror directory and flush interval
    pub fn new(target: CrawlTarget, sink: SharedSink, options: SessionOptions) -> Self {
        Self {
            target: Arc::new(target),
            sink,
            options,
            client: None,
            progress: Arc::new(|_| {}),
            cancel: CancelFlag::new(),
            state: Arc::new(DiscoveryState::new()),
            status: SessionStatus::Queued,
        }
    }

    /// Uses a prebuilt HTTP client instead of one derived from the target
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Registers a callback receiving live counters after every batch
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(ProgressSnapshot) + Send + Sync + 'static,
    {
        self.progress = Arc::new(progress);
        self
    }

    /// Shares an existing cancellation flag with this session
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Live discovery state, readable while the session runs
    pub fn state(&self) -> Arc<DiscoveryState> {
        self.state.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), CrawlError> {
        if !self.status.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!("Session status {} -> {}", self.status, next);
        self.status = next;
        Ok(())
    }

    /// Runs the session to a terminal state
    ///
    /// Per-URL failures never end the session. Failing to allocate the
    /// session, create the buffer or build the HTTP client ends it as
    /// `Failed`. Partial results are kept in every terminal state.
    pub async fn run(mut self) -> SessionReport {
        let started = Instant::now();

        if let Err(e) = self.transition(SessionStatus::Running) {
            return self.report(None, SessionMetrics::default(), Some(e.to_string()));
        }

        let session_id = {
            let allocated = self
                .sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .start_session(&self.target);
            match allocated {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("Failed to allocate session: {}", e);
                    self.status = SessionStatus::Failed;
                    return self.report(None, SessionMetrics::default(), Some(e.to_string()));
                }
            }
        };

        tracing::info!(
            "Session {} started for {} (depth {}, {} workers)",
            session_id,
            self.target.base_url,
            self.target.max_depth,
            self.target.workers
        );

        let buffer = match BufferPipeline::new(
            session_id,
            self.sink.clone(),
            self.options.buffer_size,
            &self.options.buffer_dir,
        ) {
            Ok(buffer) => Arc::new(buffer),
            Err(e) => {
                let error = CrawlError::from(e).to_string();
                return self.fail(session_id, started, None, error);
            }
        };

        let client = match self.client.take() {
            Some(client) => client,
            None => match build_http_client(&self.target) {
                Ok(client) => client,
                Err(e) => return self.fail(session_id, started, Some(&buffer), e.to_string()),
            },
        };

        let (flush_task, stop_flush) = spawn_flush_task(buffer.clone(), self.options.flush_interval);

        let ctx = Arc::new(WorkerContext::new(
            client,
            self.target.clone(),
            self.state.clone(),
            buffer.clone(),
            self.cancel.clone(),
        ));

        let crawl_started = Instant::now();
        let mut scheduler = FrontierScheduler::new(
            FrontierEntry::new(self.target.base_url.clone(), 0),
            self.target.workers,
            self.target.max_depth,
        );
        scheduler.run(ctx, self.progress.as_ref()).await;
        let crawl_time = crawl_started.elapsed();

        let _ = stop_flush.send(());
        if let Err(e) = flush_task.await {
            tracing::warn!("Flush task ended abnormally: {}", e);
        }

        let next = if self.cancel.is_cancelled() {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        };
        if let Err(e) = self.transition(next) {
            tracing::error!("{}", e);
        }

        let metrics = self.compute_metrics(started.elapsed(), crawl_time);
        self.finalize(session_id, &buffer, &metrics, None);

        tracing::info!(
            "Session {} {}: {} URLs visited, {} subdomains, {} paths in {:.2}s",
            session_id,
            self.status,
            metrics.urls_visited,
            metrics.subdomains_found,
            metrics.paths_found,
            metrics.total_time_seconds
        );

        self.report(Some(session_id), metrics, None)
    }

    fn fail(
        mut self,
        session_id: i64,
        started: Instant,
        buffer: Option<&BufferPipeline>,
        error: String,
    ) -> SessionReport {
        tracing::error!("Session {} failed: {}", session_id, error);
        self.status = SessionStatus::Failed;

        let metrics = self.compute_metrics(started.elapsed(), Duration::ZERO);
        if let Some(buffer) = buffer {
            self.finalize(session_id, buffer, &metrics, Some(&error));
        } else {
            self.complete_in_sink(session_id, &metrics, Some(&error));
        }

        self.report(Some(session_id), metrics, Some(error))
    }

    /// Drains the buffer and records the terminal status in the sink
    fn finalize(
        &self,
        session_id: i64,
        buffer: &BufferPipeline,
        metrics: &SessionMetrics,
        error: Option<&str>,
    ) {
        match buffer.final_flush() {
            Ok(flushed) => tracing::debug!("Final flush wrote {} records", flushed),
            Err(e) => tracing::error!(
                "Final flush failed, records kept in {}: {}",
                buffer.mirror().path().display(),
                e
            ),
        }

        self.complete_in_sink(session_id, metrics, error);
    }

    fn complete_in_sink(&self, session_id: i64, metrics: &SessionMetrics, error: Option<&str>) {
        let result = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .complete_session(session_id, metrics, self.status, error);

        if let Err(e) = result {
            tracing::error!("Failed to finalize session {}: {}", session_id, e);
        }
    }

    fn compute_metrics(&self, total_time: Duration, crawl_time: Duration) -> SessionMetrics {
        let urls_visited = self.state.visited_count() as u64;
        let subdomains_found = self.state.subdomain_count() as u64;
        let paths_found = self.state.path_count() as u64;
        let crawl_seconds = crawl_time.as_secs_f64();

        let per_second = |count: u64| {
            if crawl_seconds > 0.0 {
                count as f64 / crawl_seconds
            } else {
                0.0
            }
        };

        SessionMetrics {
            total_time_seconds: total_time.as_secs_f64(),
            crawl_time_seconds: crawl_seconds,
            urls_visited,
            subdomains_found,
            paths_found,
            errors_count: self.state.error_count(),
            crawl_speed: per_second(urls_visited),
            avg_time_per_url: if urls_visited > 0 {
                crawl_seconds / urls_visited as f64
            } else {
                0.0
            },
            discovery_rate: per_second(subdomains_found + paths_found),
            completed_normally: self.status == SessionStatus::Completed,
        }
    }

    fn report(
        &self,
        session_id: Option<i64>,
        metrics: SessionMetrics,
        error: Option<String>,
    ) -> SessionReport {
        SessionReport {
            session_id,
            status: self.status,
            results: CrawlResults::from_state(&self.state),
            metrics,
            error,
        }
    }
}

/// Calls `flush_if_due` on a fixed interval until told to stop
fn spawn_flush_task(
    buffer: Arc<BufferPipeline>,
    interval: Duration,
) -> (JoinHandle<()>, oneshot::Sender<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = buffer.flush_if_due() {
                        tracing::warn!("Periodic flush failed, will retry: {}", e);
                    }
                }
                _ = &mut stop_rx => break,
            }
        }
    });

    (handle, stop_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{share, SessionReader, SqliteStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(dir: &std::path::Path) -> SessionOptions {
        SessionOptions {
            buffer_size: 2,
            buffer_dir: dir.to_path_buf(),
            flush_interval: Duration::from_millis(20),
        }
    }

    fn target(base: &str) -> CrawlTarget {
        let mut target = CrawlTarget::new(Url::parse(base).unwrap());
        target.delay = Duration::ZERO;
        target.timeout = Duration::from_secs(2);
        target.workers = 2;
        target.max_depth = 2;
        target
    }

    #[test]
    fn test_new_session_is_queued() {
        let sink = share(SqliteStorage::new_in_memory().unwrap());
        let controller = SessionController::new(
            target("https://example.com/"),
            sink,
            SessionOptions::default(),
        );
        assert_eq!(controller.status(), SessionStatus::Queued);
        assert!(!controller.cancel_flag().is_cancelled());
    }

    #[tokio::test]
    async fn test_session_completes_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<a href="/a">a</a><a href="/b">b</a>"#, "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<a href="/">home</a>"#, "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let batches = Arc::new(AtomicUsize::new(0));
        let seen = batches.clone();

        let base = format!("{}/", server.uri());
        let report = SessionController::new(target(&base), storage.clone(), options(dir.path()))
            .with_progress(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .run()
            .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert!(report.metrics.completed_normally);
        assert_eq!(report.metrics.urls_visited, 3);
        assert_eq!(report.metrics.errors_count, 1);
        assert_eq!(report.results.visited_urls.len(), 3);
        assert_eq!(report.results.paths.len(), 2);
        assert!(batches.load(Ordering::SeqCst) >= 2);

        let session_id = report.session_id.unwrap();
        let storage = storage.lock().unwrap();
        let session = storage.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(storage.get_session_urls(session_id, None, 0).unwrap().len(), 3);
        let metrics = storage.get_session_metrics(session_id).unwrap().unwrap();
        assert_eq!(metrics.urls_visited, 3);

        // Mirror removed after the final flush
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let sink = share(SqliteStorage::new_in_memory().unwrap());
        let controller =
            SessionController::new(target("http://127.0.0.1:9/"), sink, options(dir.path()));
        controller.cancel_flag().cancel();

        let report = controller.run().await;
        assert_eq!(report.status, SessionStatus::Cancelled);
        assert!(!report.metrics.completed_normally);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_sink_lock_still_allocates_session() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let poisoner = storage.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the sink lock");
        })
        .join();
        assert!(storage.is_poisoned());

        let mut target = target("http://127.0.0.1:9/");
        target.max_depth = 0;
        target.timeout = Duration::from_millis(500);

        let report = SessionController::new(target, storage.clone(), options(dir.path()))
            .run()
            .await;

        assert_ne!(report.status, SessionStatus::Failed);
        let session_id = report.session_id.unwrap();
        let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
        let session = storage.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.status, report.status);
    }

    #[tokio::test]
    async fn test_invalid_proxy_fails_session() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let mut target = target("https://example.com/");
        target.proxy = Some("not a proxy url".to_string());

        let report = SessionController::new(target, storage.clone(), options(dir.path()))
            .run()
            .await;

        assert_eq!(report.status, SessionStatus::Failed);
        assert!(report.error.is_some());

        let session_id = report.session_id.unwrap();
        let session = storage.lock().unwrap().get_session(session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.error_message.is_some());
    }
}
