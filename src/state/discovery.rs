//! Per-session discovery sets shared by all fetch workers
//!
//! Each set has its own lock, held only for a single check-then-insert. No lock
//! is ever held across a network call.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Live counters a job surface can poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub urls_visited: usize,
    pub subdomains_found: usize,
    pub paths_found: usize,
    /// Deepest frontier depth attempted so far
    pub current_depth: u32,
}

/// Shared discovery state for one session
///
/// Invariants:
/// - a URL enters the visited set at most once and is never removed
/// - subdomain and path sets only grow
/// - check-then-insert on one set is atomic
#[derive(Debug, Default)]
pub struct DiscoveryState {
    visited: Mutex<HashSet<String>>,
    subdomains: Mutex<HashSet<String>>,
    paths: Mutex<HashSet<String>>,
    current_depth: AtomicU32,
    outcomes: AtomicU64,
    errors: AtomicU64,
    completed_attempts: AtomicU64,
}

fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sorted(set: &Mutex<HashSet<String>>) -> Vec<String> {
    let mut items: Vec<String> = lock(set).iter().cloned().collect();
    items.sort();
    items
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Visited URLs =====

    /// Atomically inserts a URL into the visited set
    ///
    /// Returns true only for the single caller that inserted it.
    pub fn mark_visited(&self, url: &str) -> bool {
        lock(&self.visited).insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        lock(&self.visited).contains(url)
    }

    pub fn visited_count(&self) -> usize {
        lock(&self.visited).len()
    }

    pub fn visited_urls(&self) -> Vec<String> {
        sorted(&self.visited)
    }

    // ===== Subdomains =====

    /// Inserts a subdomain, returning true if it was new
    pub fn add_subdomain(&self, subdomain: &str) -> bool {
        lock(&self.subdomains).insert(subdomain.to_string())
    }

    pub fn subdomain_count(&self) -> usize {
        lock(&self.subdomains).len()
    }

    pub fn subdomains(&self) -> Vec<String> {
        sorted(&self.subdomains)
    }

    // ===== Paths =====

    /// Inserts an in-domain URL into the found paths, returning true if it was new
    pub fn add_path(&self, url: &str) -> bool {
        lock(&self.paths).insert(url.to_string())
    }

    pub fn path_count(&self) -> usize {
        lock(&self.paths).len()
    }

    pub fn paths(&self) -> Vec<String> {
        sorted(&self.paths)
    }

    // ===== Counters =====

    /// Records that one outcome record was emitted
    pub fn record_outcome(&self, is_error: bool) {
        self.outcomes.fetch_add(1, Ordering::SeqCst);
        if is_error {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records that a worker finished an attempt, whatever happened
    pub fn record_completion(&self) {
        self.completed_attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn note_depth(&self, depth: u32) {
        self.current_depth.fetch_max(depth, Ordering::SeqCst);
    }

    pub fn outcome_count(&self) -> u64 {
        self.outcomes.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn completed_attempts(&self) -> u64 {
        self.completed_attempts.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            urls_visited: self.visited_count(),
            subdomains_found: self.subdomain_count(),
            paths_found: self.path_count(),
            current_depth: self.current_depth.load(Ordering::SeqCst),
        }
    }
}
