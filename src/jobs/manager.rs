use crate::config::CrawlTarget;
use crate::crawler::{CancelFlag, CrawlResults, SessionController, SessionOptions, SessionReport};
use crate::jobs::{JobError, JobResult};
use crate::state::{ProgressSnapshot, SessionStatus};
use crate::storage::{SessionMetrics, SharedSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type JobId = Uuid;

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub url: String,
    pub status: SessionStatus,
    pub progress: ProgressSnapshot,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub session_id: Option<i64>,
    pub error: Option<String>,
}

/// Results of a finished job
#[derive(Debug, Clone, Serialize)]
pub struct JobResults {
    pub id: JobId,
    pub url: String,
    pub status: SessionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: CrawlResults,
    pub metrics: SessionMetrics,
}

/// Aggregate counters across all known jobs
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub finished_jobs: usize,
    pub status_breakdown: BTreeMap<String, usize>,
    pub total_urls_crawled: usize,
    pub total_subdomains_discovered: usize,
    pub total_paths_discovered: usize,
}

struct JobEntry {
    snapshot: JobSnapshot,
    cancel: CancelFlag,
    report: Option<SessionReport>,
    handle: Option<JoinHandle<()>>,
}

type JobTable = Arc<Mutex<HashMap<JobId, JobEntry>>>;

/// Runs crawl sessions as background jobs
///
/// Clones share the same job table.
#[derive(Clone)]
pub struct JobManager {
    sink: SharedSink,
    options: SessionOptions,
    jobs: JobTable,
}

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobManager {
    pub fn new(sink: SharedSink, options: SessionOptions) -> Self {
        Self {
            sink,
            options,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queues a crawl of `target` and starts it in the background
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// The new job's ID
    pub fn create_job(&self, target: CrawlTarget) -> JobId {
        let id = Uuid::new_v4();
        let cancel = CancelFlag::new();

        let snapshot = JobSnapshot {
            id,
            url: target.base_url.to_string(),
            status: SessionStatus::Queued,
            progress: ProgressSnapshot::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            session_id: None,
            error: None,
        };

        let progress_jobs = self.jobs.clone();
        let controller = SessionController::new(target, self.sink.clone(), self.options.clone())
            .with_cancel_flag(cancel.clone())
            .with_progress(move |progress| {
                if let Some(entry) = lock(&progress_jobs).get_mut(&id) {
                    entry.snapshot.progress = progress;
                }
            });
        let live_state = controller.state();

        lock(&self.jobs).insert(
            id,
            JobEntry {
                snapshot,
                cancel,
                report: None,
                handle: None,
            },
        );

        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move {
            if let Some(entry) = lock(&jobs).get_mut(&id) {
                entry.snapshot.status = SessionStatus::Running;
                entry.snapshot.started_at = Some(Utc::now());
            }

            let report = controller.run().await;

            if let Some(entry) = lock(&jobs).get_mut(&id) {
                entry.snapshot.status = report.status;
                entry.snapshot.completed_at = Some(Utc::now());
                entry.snapshot.session_id = report.session_id;
                entry.snapshot.error = report.error.clone();
                entry.snapshot.progress = live_state.progress();
                entry.report = Some(report);
            }
        });

        if let Some(entry) = lock(&self.jobs).get_mut(&id) {
            entry.handle = Some(handle);
        }

        tracing::info!("Created crawl job {}", id);
        id
    }

    /// Gets the current state of a job
    pub fn job(&self, id: JobId) -> JobResult<JobSnapshot> {
        lock(&self.jobs)
            .get(&id)
            .map(|entry| entry.snapshot.clone())
            .ok_or(JobError::NotFound(id))
    }

    /// Requests cancellation of a queued or running job
    ///
    /// The job reaches `Cancelled` once its in-flight requests finish.
    pub fn cancel_job(&self, id: JobId) -> JobResult<JobSnapshot> {
        let jobs = lock(&self.jobs);
        let entry = jobs.get(&id).ok_or(JobError::NotFound(id))?;

        if entry.snapshot.status.is_terminal() {
            return Err(JobError::AlreadyFinished(id));
        }

        entry.cancel.cancel();
        tracing::info!("Cancellation requested for job {}", id);
        Ok(entry.snapshot.clone())
    }

    /// Lists jobs newest first
    ///
    /// # Arguments
    ///
    /// * `status` - Only return jobs in this status
    /// * `limit` - Maximum number of jobs
    /// * `offset` - Number of jobs to skip
    pub fn list_jobs(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
        offset: usize,
    ) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = lock(&self.jobs)
            .values()
            .map(|entry| entry.snapshot.clone())
            .filter(|snapshot| status.map_or(true, |s| snapshot.status == s))
            .collect();

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.into_iter().skip(offset).take(limit).collect()
    }

    /// Gets the results of a terminal job
    ///
    /// Cancelled jobs return their partial results. Failed jobs return their
    /// error.
    pub fn job_results(&self, id: JobId) -> JobResult<JobResults> {
        let jobs = lock(&self.jobs);
        let entry = jobs.get(&id).ok_or(JobError::NotFound(id))?;

        let report = match (&entry.report, entry.snapshot.status) {
            (_, SessionStatus::Failed) => {
                return Err(JobError::Failed {
                    id,
                    error: entry
                        .snapshot
                        .error
                        .clone()
                        .unwrap_or_else(|| "Unknown error occurred".to_string()),
                })
            }
            (Some(report), status) if status.is_terminal() => report,
            (_, status) => return Err(JobError::NotFinished { id, status }),
        };

        Ok(JobResults {
            id,
            url: entry.snapshot.url.clone(),
            status: report.status,
            completed_at: entry.snapshot.completed_at,
            results: report.results.clone(),
            metrics: report.metrics.clone(),
        })
    }

    /// Waits for a job to reach a terminal state
    pub async fn wait(&self, id: JobId) -> JobResult<JobSnapshot> {
        let handle = {
            let mut jobs = lock(&self.jobs);
            let entry = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
            entry.handle.take()
        };

        if let Some(handle) = handle {
            handle.await.map_err(|_| JobError::TaskAborted(id))?;
        }

        self.job(id)
    }

    /// Removes every terminal job
    ///
    /// # Returns
    ///
    /// Number of jobs removed
    pub fn clear_finished(&self) -> usize {
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, entry| entry.snapshot.status.is_active());
        let removed = before - jobs.len();
        tracing::info!("Cleared {} finished jobs", removed);
        removed
    }

    /// Counts jobs per status and sums their progress
    pub fn job_stats(&self) -> JobStats {
        let jobs = lock(&self.jobs);
        let mut stats = JobStats {
            total_jobs: jobs.len(),
            ..Default::default()
        };

        for status in SessionStatus::all() {
            stats.status_breakdown.insert(status.to_string(), 0);
        }

        for entry in jobs.values() {
            let snapshot = &entry.snapshot;
            if snapshot.status.is_active() {
                stats.active_jobs += 1;
            } else {
                stats.finished_jobs += 1;
            }
            *stats
                .status_breakdown
                .entry(snapshot.status.to_string())
                .or_insert(0) += 1;
            stats.total_urls_crawled += snapshot.progress.urls_visited;
            stats.total_subdomains_discovered += snapshot.progress.subdomains_found;
            stats.total_paths_discovered += snapshot.progress.paths_found;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{share, SqliteStorage};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    fn manager() -> (JobManager, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let options = SessionOptions {
            buffer_size: 10,
            buffer_dir: dir.path().to_path_buf(),
            flush_interval: Duration::from_millis(50),
        };
        let sink = share(SqliteStorage::new_in_memory().unwrap());
        (JobManager::new(sink, options), dir)
    }

    fn unreachable_target() -> CrawlTarget {
        let mut target = CrawlTarget::new(Url::parse("http://127.0.0.1:9/").unwrap());
        target.delay = Duration::ZERO;
        target.timeout = Duration::from_millis(500);
        target
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (manager, _dir) = manager();
        let id = Uuid::new_v4();
        assert!(matches!(manager.job(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.cancel_job(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.job_results(id), Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let (manager, _dir) = manager();
        let id = manager.create_job(unreachable_target());

        let snapshot = manager.wait(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.completed_at.is_some());
        assert!(snapshot.session_id.is_some());
        assert_eq!(snapshot.progress.urls_visited, 1);

        let results = manager.job_results(id).unwrap();
        assert_eq!(results.results.visited_urls, vec!["http://127.0.0.1:9/"]);
        assert_eq!(results.metrics.errors_count, 1);

        // Finished jobs cannot be cancelled
        assert!(matches!(
            manager.cancel_job(id),
            Err(JobError::AlreadyFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filter_and_clear() {
        let (manager, _dir) = manager();
        let first = manager.create_job(unreachable_target());
        let second = manager.create_job(unreachable_target());
        manager.wait(first).await.unwrap();
        manager.wait(second).await.unwrap();

        assert_eq!(manager.list_jobs(None, 10, 0).len(), 2);
        assert_eq!(manager.list_jobs(None, 1, 0).len(), 1);
        assert_eq!(manager.list_jobs(None, 10, 1).len(), 1);
        assert_eq!(
            manager
                .list_jobs(Some(SessionStatus::Completed), 10, 0)
                .len(),
            2
        );
        assert!(manager
            .list_jobs(Some(SessionStatus::Running), 10, 0)
            .is_empty());

        let stats = manager.job_stats();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.finished_jobs, 2);
        assert_eq!(stats.status_breakdown["completed"], 2);
        assert_eq!(stats.status_breakdown["running"], 0);
        assert_eq!(stats.total_urls_crawled, 2);

        assert_eq!(manager.clear_finished(), 2);
        assert!(manager.list_jobs(None, 10, 0).is_empty());
    }
}
