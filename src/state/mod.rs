//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `DiscoveryState`: per-session visited URLs, subdomains and paths
//! - `SessionStatus`: lifecycle of a session (queued, running, terminal)

mod discovery;
mod session_status;

// Re-export main types
pub use discovery::{DiscoveryState, ProgressSnapshot};
pub use session_status::SessionStatus;
