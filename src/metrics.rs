use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-stage line counters
///
/// Cloning shares the underlying counters, so the pipeline can hand one
/// handle to the stage thread and keep another for observation.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    lines_in: Arc<AtomicU64>,
    lines_out: Arc<AtomicU64>,
    lines_truncated: Arc<AtomicU64>,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            lines_in: Arc::new(AtomicU64::new(0)),
            lines_out: Arc::new(AtomicU64::new(0)),
            lines_truncated: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record one acquired line
    pub fn record_in(&self) {
        self.lines_in.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one delivered line
    pub fn record_out(&self) {
        self.lines_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one truncated oversized line
    pub fn record_truncated(&self) {
        self.lines_truncated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of lines acquired
    pub fn total_in(&self) -> u64 {
        self.lines_in.load(Ordering::Relaxed)
    }

    /// Get the total number of lines delivered
    pub fn total_out(&self) -> u64 {
        self.lines_out.load(Ordering::Relaxed)
    }

    /// Get the total number of truncated lines
    pub fn total_truncated(&self) -> u64 {
        self.lines_truncated.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_in: self.total_in(),
            lines_out: self.total_out(),
            lines_truncated: self.total_truncated(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of stage counters at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_in: u64,
    pub lines_out: u64,
    pub lines_truncated: u64,
}

impl MetricsSnapshot {
    /// Format counters as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "In: {}, Out: {}, Truncated: {}",
            self.lines_in, self.lines_out, self.lines_truncated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = StageMetrics::new();
        for _ in 0..10 {
            metrics.record_in();
        }
        metrics.record_out();
        metrics.record_truncated();
        assert_eq!(metrics.total_in(), 10);
        assert_eq!(metrics.total_out(), 1);
        assert_eq!(metrics.total_truncated(), 1);
    }

    #[test]
    fn test_clone_shares_counters() {
        let metrics = StageMetrics::new();
        let handle = metrics.clone();
        handle.record_in();
        assert_eq!(metrics.total_in(), 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = StageMetrics::new();
        metrics.record_in();
        metrics.record_out();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lines_in, 1);
        assert_eq!(snapshot.lines_out, 1);
        assert_eq!(snapshot.lines_truncated, 0);
        assert!(snapshot.format().contains("In: 1"));
    }
}
