//! Console reports for crawl sessions
//!
//! This module prints the end-of-crawl summary and the reports read back
//! from the session database.

use crate::crawler::SessionReport;
use crate::state::SessionStatus;
use crate::storage::{CrawledUrlRow, SessionExport, SessionRecord, StatsSummary};

const RULE: &str = "============================================================";

/// Prints the summary of a finished crawl
///
/// # Arguments
///
/// * `report` - The session report returned by the controller
/// * `show_subdomains` - Also list every discovered subdomain
pub fn print_session_report(report: &SessionReport, show_subdomains: bool) {
    println!("\n{}", RULE);

    match report.status {
        SessionStatus::Cancelled => println!("[INTERRUPTED] - Crawl was stopped early\n"),
        SessionStatus::Failed => println!(
            "[FAILED] - {}\n",
            report.error.as_deref().unwrap_or("Unknown error occurred")
        ),
        _ => println!("[COMPLETED] - Crawl finished successfully\n"),
    }

    if let Some(id) = report.session_id {
        println!("Session: #{}", id);
    }

    println!("Results:");
    println!("  Total URLs visited: {}", report.results.visited_urls.len());
    println!("  Subdomains found: {}", report.results.subdomains.len());
    println!("  Paths found: {}", report.results.paths.len());
    println!();

    let metrics = &report.metrics;
    println!("Execution Metrics:");
    println!("  Total time: {:.2} seconds", metrics.total_time_seconds);
    println!("  Crawl time: {:.2} seconds", metrics.crawl_time_seconds);
    if metrics.urls_visited > 0 {
        println!("  Crawl speed: {:.2} URLs/second", metrics.crawl_speed);
        println!("  Avg time/URL: {:.3} seconds", metrics.avg_time_per_url);
        println!("  Discovery rate: {:.2} items/second", metrics.discovery_rate);
    }
    println!("  Errors: {}", metrics.errors_count);

    if show_subdomains && !report.results.subdomains.is_empty() {
        println!("\nSubdomains:");
        for subdomain in &report.results.subdomains {
            println!("  - {}", subdomain);
        }
    }

    println!("{}", RULE);
}

/// Prints database-wide totals and the most recent sessions
///
/// # Arguments
///
/// * `summary` - Totals across every stored session
/// * `recent` - Recent sessions, newest first
pub fn print_statistics(summary: &StatsSummary, recent: &[SessionRecord]) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total sessions: {}", summary.total_sessions);
    println!("  Total URLs crawled: {}", summary.total_urls);
    println!("  Unique subdomains: {}", summary.unique_subdomains);
    println!();

    if recent.is_empty() {
        println!("No sessions recorded.");
        return;
    }

    println!("Recent Sessions:");
    for session in recent {
        println!(
            "  #{} [{}] {} (started {})",
            session.id, session.status, session.target_url, session.started_at
        );
    }
}

/// Prints everything stored for one session
///
/// # Arguments
///
/// * `export` - The session, its metrics, URLs and subdomains
/// * `errors_only` - `export.urls` holds only failed fetches
pub fn print_session_details(export: &SessionExport, errors_only: bool) {
    let session = &export.session;
    println!("=== Session #{} ===\n", session.id);

    println!("Target: {}", session.target_url);
    println!("Status: {}", session.status);
    println!("Started: {}", session.started_at);
    if let Some(completed) = &session.completed_at {
        println!("Completed: {}", completed);
    }
    println!(
        "Settings: depth {}, {} workers, {}s delay, {}s timeout",
        session.max_depth, session.workers, session.rate_limit, session.timeout
    );
    if let Some(error) = &session.error_message {
        println!("Error: {}", error);
    }
    println!();

    if let Some(metrics) = &export.metrics {
        println!("Metrics:");
        println!("  URLs visited: {}", metrics.urls_visited);
        println!("  Subdomains found: {}", metrics.subdomains_found);
        println!("  Paths found: {}", metrics.paths_found);
        println!("  Errors: {}", metrics.errors_count);
        println!("  Crawl time: {:.2} seconds", metrics.crawl_time_seconds);
        println!();
    }

    if !errors_only && !export.subdomains.is_empty() {
        println!("Subdomains ({}):", export.subdomains.len());
        for row in &export.subdomains {
            println!("  - {} ({} URLs)", row.subdomain, row.url_count);
        }
        println!();
    }

    let heading = if errors_only { "Failed URLs" } else { "URLs" };
    println!("{} ({}):", heading, export.urls.len());
    for row in &export.urls {
        println!("  {}", format_url_row(row));
    }
}

fn format_url_row(row: &CrawledUrlRow) -> String {
    let status = row
        .status_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "---".to_string());
    match &row.error_message {
        Some(error) => format!("[{}] {} - {}", status, row.url, error),
        None => format!("[{}] {}", status, row.url),
    }
}
