//! Update statistics.
//!
//! Counters come in pairs: a short-window count since the last commit and a
//! cumulative total. Counters report health only; they never gate operations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A write-mostly counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Add one.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n`.
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Subtract `n`.
    pub fn sub(&self, n: u64) {
        self.0.fetch_sub(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn sum(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Return the current value and reset to zero in one step.
    pub fn sum_then_reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Counters maintained by the update coordinator.
#[derive(Debug, Default)]
pub struct UpdateStats {
    pub add_commands: Counter,
    pub add_commands_cumulative: Counter,
    pub delete_by_id_commands: Counter,
    pub delete_by_id_commands_cumulative: Counter,
    pub delete_by_query_commands: Counter,
    pub delete_by_query_commands_cumulative: Counter,
    pub expunge_delete_commands: Counter,
    pub merge_indexes_commands: Counter,
    pub commit_commands: Counter,
    pub soft_commit_commands: Counter,
    pub optimize_commands: Counter,
    pub rollback_commands: Counter,
    pub num_docs_pending: Counter,
    pub num_errors: Counter,
    pub num_errors_cumulative: Counter,
}

impl UpdateStats {
    /// Count a failure in both the windowed and the cumulative error counter.
    pub fn record_error(&self) {
        self.num_errors.increment();
        self.num_errors_cumulative.increment();
    }
}

/// Read-only snapshot of the statistics surface.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatsSnapshot {
    pub adds: u64,
    pub cumulative_adds: u64,
    pub deletes_by_id: u64,
    pub cumulative_deletes_by_id: u64,
    pub deletes_by_query: u64,
    pub cumulative_deletes_by_query: u64,
    pub errors: u64,
    pub cumulative_errors: u64,
    pub commits: u64,
    pub soft_commits: u64,
    pub optimizes: u64,
    pub expunge_deletes: u64,
    pub merges: u64,
    pub rollbacks: u64,
    pub docs_pending: u64,
    pub autocommit_max_docs: i64,
    pub autocommit_max_time_ms: i64,
    pub autocommits: u64,
    pub soft_autocommit_max_docs: i64,
    pub soft_autocommit_max_time_ms: i64,
    pub soft_autocommits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_ops() {
        let counter = Counter::default();
        counter.increment();
        counter.increment();
        counter.add(3);
        assert_eq!(counter.sum(), 5);

        counter.sub(2);
        assert_eq!(counter.sum(), 3);

        assert_eq!(counter.sum_then_reset(), 3);
        assert_eq!(counter.sum(), 0);
    }

    #[test]
    fn test_record_error_counts_both() {
        let stats = UpdateStats::default();
        stats.record_error();
        stats.record_error();
        assert_eq!(stats.num_errors.sum(), 2);
        assert_eq!(stats.num_errors_cumulative.sum(), 2);

        stats.num_errors.reset();
        assert_eq!(stats.num_errors.sum(), 0);
        assert_eq!(stats.num_errors_cumulative.sum(), 2);
    }
}
