//! Crawler module - the crawl engine
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and outcome classification
//! - HTML and JSON link extraction
//! - One crawl attempt per frontier entry
//! - Batched frontier scheduling
//! - Session lifecycle and finalization

mod cancel;
mod coordinator;
mod extractor;
mod fetcher;
mod scheduler;
mod worker;

pub use cancel::CancelFlag;
pub use coordinator::{CrawlResults, SessionController, SessionOptions, SessionReport};
pub use extractor::{Candidates, ContentKind};
pub use fetcher::{build_http_client, client_builder, fetch_url, request_headers, FetchOutcome};
pub use scheduler::{FrontierEntry, FrontierScheduler, ProgressFn, SchedulerState};
pub use worker::{crawl_entry, WorkerContext};

use crate::config::{CrawlTarget, StorageOptions};
use crate::storage::SharedSink;

/// Runs a complete crawl session
///
/// This is the main entry point for a one-off crawl. It will:
/// 1. Allocate a session in the sink
/// 2. Build the HTTP client
/// 3. Schedule and fetch pages up to the maximum depth
/// 4. Flush every record and finalize the session
///
/// # Arguments
///
/// * `target` - What to crawl
/// * `sink` - Where records and metrics are persisted
/// * `storage` - Buffer threshold, mirror directory and flush interval
/// * `cancel` - Flag that stops new dispatch when set
pub async fn crawl(
    target: CrawlTarget,
    sink: SharedSink,
    storage: &StorageOptions,
    cancel: CancelFlag,
) -> SessionReport {
    SessionController::new(target, sink, SessionOptions::from(storage))
        .with_cancel_flag(cancel)
        .run()
        .await
}
