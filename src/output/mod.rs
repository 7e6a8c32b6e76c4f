//! Output module for crawl results and reports
//!
//! This module handles:
//! - Saving discovered subdomains and paths to result files
//! - Printing session summaries and database statistics

mod export;
pub mod stats;

pub use export::{save_results, ResultsFile, ResultsStats};
pub use stats::{print_session_details, print_session_report, print_statistics};
