use dashmap::DashSet;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// FIFO queue of URLs waiting to be fetched
#[derive(Debug, Default)]
pub struct Frontier {
    queue: Mutex<VecDeque<String>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a URL to the tail of the queue
    pub fn enqueue(&self, url: impl Into<String>) {
        self.lock().push_back(url.into());
    }

    /// Remove and return the head of the queue, or None when empty
    pub fn dequeue(&self) -> Option<String> {
        self.lock().pop_front()
    }

    /// Number of URLs still pending
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Empty the queue, returning what was left in FIFO order
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    // A push or pop cannot leave the deque half-written, so a poisoned
    // lock still guards a consistent queue.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every URL ever discovered. Grows monotonically, never used for ordering.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the URL if absent. Returns true only for the caller that
    /// performed the insertion; the check and the insert are one operation.
    pub fn add_if_absent(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn size(&self) -> usize {
        self.urls.len()
    }
}

/// Frontier and visited set kept in lockstep: a URL reaches the frontier
/// at most once over the lifetime of a crawl.
#[derive(Debug, Clone, Default)]
pub struct UrlStore {
    frontier: Arc<Frontier>,
    visited: Arc<VisitedSet>,
}

impl UrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the URL as seen and queue it if nobody has seen it before.
    /// Returns true if it was added to the frontier.
    pub fn add_to_frontier(&self, url: &str) -> bool {
        if !self.visited.add_if_absent(url) {
            return false;
        }
        self.frontier.enqueue(url);
        true
    }

    /// Pop the next URL to crawl, None if the frontier is empty
    pub fn pop_from_frontier(&self) -> Option<String> {
        self.frontier.dequeue()
    }

    pub fn frontier_count(&self) -> usize {
        self.frontier.size()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.size()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Take whatever is still queued, leaving the frontier empty
    pub fn drain_frontier(&self) -> Vec<String> {
        self.frontier.drain()
    }
}
