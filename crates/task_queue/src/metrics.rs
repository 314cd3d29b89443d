//! Queue metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Tasks pushed but not yet started
    pending: AtomicUsize,
    /// Total tasks pushed
    pushed: AtomicU64,
    /// Total tasks whose handler returned Ok
    completed: AtomicU64,
    /// Total tasks whose handler returned Err
    failed: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting to run
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Record a push, returns the new pending count
    pub(crate) fn on_push(&self) -> usize {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a task leaving the queue, returns the new pending count
    pub(crate) fn on_start(&self) -> usize {
        self.pending.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub(crate) fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            pending: self.pending(),
            pushed: self.pushed(),
            completed: self.completed(),
            failed: self.failed(),
        }
    }
}

/// Snapshot of queue metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub pending: usize,
    pub pushed: u64,
    pub completed: u64,
    pub failed: u64,
}
