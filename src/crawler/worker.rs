//! One crawl attempt for one frontier entry

use crate::buffer::BufferPipeline;
use crate::config::CrawlTarget;
use crate::crawler::extractor::Candidates;
use crate::crawler::fetcher::{fetch_url, FetchOutcome};
use crate::crawler::{CancelFlag, FrontierEntry};
use crate::state::DiscoveryState;
use crate::storage::{OutcomeRecord, SubdomainRecord};
use crate::url::{is_http, registrable_domain, same_registrable_domain, strip_fragment, subdomain_of};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Everything a worker shares with the rest of its session
pub struct WorkerContext {
    pub client: Client,
    pub target: Arc<CrawlTarget>,
    pub state: Arc<DiscoveryState>,
    pub buffer: Arc<BufferPipeline>,
    pub cancel: CancelFlag,
    permits: Arc<Semaphore>,
    base_domain: String,
}

impl WorkerContext {
    pub fn new(
        client: Client,
        target: Arc<CrawlTarget>,
        state: Arc<DiscoveryState>,
        buffer: Arc<BufferPipeline>,
        cancel: CancelFlag,
    ) -> Self {
        let base_domain = registrable_domain(&target.base_url)
            .unwrap_or_else(|| target.base_url.host_str().unwrap_or_default().to_string());
        let permits = Arc::new(Semaphore::new(target.workers.max(1)));

        Self {
            client,
            target,
            state,
            buffer,
            cancel,
            permits,
            base_domain,
        }
    }

    /// Registrable domain of the crawl target
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    fn in_scope(&self, url: &Url) -> bool {
        same_registrable_domain(url, &self.target.base_url)
    }

    /// Adds a subdomain to the discovery state and buffers it on first sight
    fn note_subdomain(&self, url: &Url) {
        let Some(subdomain) = subdomain_of(url) else {
            return;
        };

        if self.state.add_subdomain(&subdomain) {
            tracing::info!("Found subdomain: {}", subdomain);
            let record = SubdomainRecord {
                subdomain,
                base_domain: self.base_domain.clone(),
            };
            if let Err(e) = self.buffer.append_subdomain(record) {
                tracing::warn!("Failed to mirror subdomain record: {}", e);
            }
        }
    }
}

/// Performs one crawl attempt
///
/// # Protocol
///
/// 1. Return immediately if the session is cancelled
/// 2. Claim the URL in the visited set; return if another worker already did
/// 3. Sleep the inter-request delay
/// 4. Fetch under a concurrency permit
/// 5. On HTTP 200 record paths and subdomains and extract children
/// 6. Buffer exactly one outcome record and report completion
///
/// # Returns
///
/// Child entries at `depth + 1`, empty unless the fetch returned HTTP 200
pub async fn crawl_entry(ctx: Arc<WorkerContext>, entry: FrontierEntry) -> Vec<FrontierEntry> {
    if ctx.cancel.is_cancelled() {
        return Vec::new();
    }

    if !ctx.state.mark_visited(entry.url.as_str()) {
        return Vec::new();
    }

    tracing::debug!("Visiting {} (depth: {})", entry.url, entry.depth);
    ctx.state.note_depth(entry.depth);

    if !ctx.target.delay.is_zero() {
        tokio::time::sleep(ctx.target.delay).await;
    }

    let outcome = {
        let _permit = ctx.permits.acquire().await.ok();
        fetch_url(&ctx.client, &entry.url).await
    };

    let mut record = base_record(&entry);
    let mut children = Vec::new();

    match outcome {
        FetchOutcome::Success {
            final_url,
            content_type,
            body,
            elapsed,
        } => {
            record.status_code = Some(200);
            record.response_time_ms = Some(millis(elapsed));
            children = process_page(&ctx, &entry, &final_url, content_type.as_deref(), &body);
            record.content_type = content_type;
        }
        FetchOutcome::BodyError {
            content_type,
            elapsed,
            error,
        } => {
            record.status_code = Some(200);
            record.content_type = content_type;
            record.response_time_ms = Some(millis(elapsed));
            record.error_message = Some(error);
        }
        FetchOutcome::HttpStatus {
            status_code,
            content_type,
            elapsed,
        } => {
            tracing::debug!("Non-200 status for {}: {}", entry.url, status_code);
            record.status_code = Some(status_code);
            record.content_type = content_type;
            record.response_time_ms = Some(millis(elapsed));
        }
        FetchOutcome::Timeout => {
            tracing::debug!("Timeout: {}", entry.url);
            record.error_message = Some("Request timeout".to_string());
        }
        FetchOutcome::ClientError(message) => {
            tracing::debug!("Error crawling {}: {}", entry.url, message);
            record.error_message = Some(message);
        }
    }

    ctx.state.record_outcome(record.is_error());
    if let Err(e) = ctx.buffer.append_outcome(record) {
        tracing::warn!("Failed to mirror outcome for {}: {}", entry.url, e);
    }
    ctx.state.record_completion();

    children
}

/// Handles an HTTP 200 page. Holds no lock or parsed document across an await.
fn process_page(
    ctx: &WorkerContext,
    entry: &FrontierEntry,
    final_url: &Url,
    content_type: Option<&str>,
    body: &str,
) -> Vec<FrontierEntry> {
    if ctx.in_scope(&entry.url) {
        ctx.state.add_path(entry.url.as_str());
    }
    if final_url != &entry.url && ctx.in_scope(final_url) {
        ctx.state.add_path(final_url.as_str());
    }
    ctx.note_subdomain(final_url);

    let candidates = Candidates::parse(content_type, body, &entry.url);
    let mut children = Vec::new();

    for candidate in candidates.iter() {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if !is_http(&candidate) || ctx.target.exclusions.excludes(&candidate) {
            continue;
        }
        if !ctx.in_scope(&candidate) {
            continue;
        }

        ctx.note_subdomain(&candidate);

        if entry.depth < ctx.target.max_depth {
            children.push(FrontierEntry::new(candidate, entry.depth + 1));
        }
    }

    children
}

fn base_record(entry: &FrontierEntry) -> OutcomeRecord {
    let url = &entry.url;
    let domain = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    OutcomeRecord {
        url: url.to_string(),
        normalized_url: strip_fragment(url.clone()).to_string(),
        domain,
        path: url.path().to_string(),
        depth: entry.depth,
        status_code: None,
        content_type: None,
        response_time_ms: None,
        error_message: None,
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
