//! Frontier scheduler
//!
//! This module handles:
//! - The FIFO frontier of pending entries
//! - Drawing bounded batches and dispatching one worker task per entry
//! - Merging child entries back into the frontier
//! - Stopping when the frontier is exhausted or the session is cancelled

use crate::crawler::worker::{crawl_entry, WorkerContext};
use crate::state::{DiscoveryState, ProgressSnapshot};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// A URL waiting to be crawled at a given depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(url: Url, depth: u32) -> Self {
        Self { url, depth }
    }
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Between batches
    Idle,
    /// A batch is in flight
    Draining,
    /// Frontier exhausted or cancellation observed
    Terminated,
}

/// Callback invoked with live counters after every batch
pub type ProgressFn = dyn Fn(ProgressSnapshot) + Send + Sync;

/// Frontier scheduler for one session
pub struct FrontierScheduler {
    pending: VecDeque<FrontierEntry>,
    batch_size: usize,
    max_depth: u32,
    state: SchedulerState,
    batches_dispatched: u64,
}

impl FrontierScheduler {
    /// Creates a scheduler seeded with the root entry
    ///
    /// # Arguments
    ///
    /// * `seed` - Root entry, normally the target URL at depth 0
    /// * `workers` - Worker concurrency; batches hold up to twice this many entries
    /// * `max_depth` - Entries deeper than this are never enqueued
    pub fn new(seed: FrontierEntry, workers: usize, max_depth: u32) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(seed);

        Self {
            pending,
            batch_size: workers.max(1) * 2,
            max_depth,
            state: SchedulerState::Idle,
            batches_dispatched: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn batches_dispatched(&self) -> u64 {
        self.batches_dispatched
    }

    /// Draws the next batch of `min(2 × workers, pending)` entries in FIFO order
    pub fn next_batch(&mut self) -> Vec<FrontierEntry> {
        let size = self.batch_size.min(self.pending.len());
        if size > 0 {
            self.state = SchedulerState::Draining;
            self.batches_dispatched += 1;
        }
        self.pending.drain(..size).collect()
    }

    /// Appends child entries, dropping URLs already visited
    ///
    /// # Returns
    ///
    /// Number of entries enqueued
    pub fn merge(&mut self, children: Vec<FrontierEntry>, state: &DiscoveryState) -> usize {
        let before = self.pending.len();
        let max_depth = self.max_depth;
        self.pending.extend(
            children
                .into_iter()
                .filter(|child| child.depth <= max_depth)
                .filter(|child| !state.is_visited(child.url.as_str())),
        );
        self.state = SchedulerState::Idle;
        self.pending.len() - before
    }

    /// Drives batches until the frontier is empty or the session is cancelled
    ///
    /// In-flight tasks of the current batch always run to completion.
    pub async fn run(&mut self, ctx: Arc<WorkerContext>, progress: &ProgressFn) -> SchedulerState {
        loop {
            if self.pending.is_empty() {
                tracing::info!(
                    "Frontier is empty, crawl complete after {} attempts",
                    ctx.state.completed_attempts()
                );
                break;
            }
            if ctx.cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation observed, {} entries left pending",
                    self.pending.len()
                );
                break;
            }

            let batch = self.next_batch();
            tracing::debug!(
                "Dispatching batch {} with {} entries",
                self.batches_dispatched,
                batch.len()
            );

            let mut tasks = JoinSet::new();
            for entry in batch {
                tasks.spawn(crawl_entry(ctx.clone(), entry));
            }

            let mut children = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(found) => children.extend(found),
                    Err(e) => tracing::error!("Fetch task failed: {}", e),
                }
            }

            let added = self.merge(children, &ctx.state);
            tracing::debug!("Merged {} new entries, {} pending", added, self.pending.len());

            progress(ctx.state.progress());
        }

        self.state = SchedulerState::Terminated;
        self.state
    }
}
