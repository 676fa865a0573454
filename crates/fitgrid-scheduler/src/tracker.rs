//! Performance tracker — the feedback loop behind the history sub-score.
//!
//! Every completed or failed task updates the owning node's
//! [`PerformanceStats`] in a single `&mut` call, so counters and derived
//! rates are never observed out of step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fitgrid_core::NodeId;

/// Success rate reported before any task has finished.
const NO_HISTORY_SUCCESS_RATE: f64 = 0.5;

/// Rolling reliability and latency statistics for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub tasks_completed: u64,
    /// Sum of elapsed seconds over successful tasks.
    pub total_time: f64,
    /// Mean elapsed seconds over successful tasks.
    pub avg_time: f64,
    pub failures: u64,
    /// `completed / (completed + failures)`.
    pub success_rate: f64,
}

impl Default for PerformanceStats {
    /// Fresh record for a newly registered node: optimistic 1.0 success rate.
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            total_time: 0.0,
            avg_time: 0.0,
            failures: 0,
            success_rate: 1.0,
        }
    }
}

impl PerformanceStats {
    /// Apply one task outcome and recompute the derived fields.
    fn record(&mut self, elapsed_secs: f64, success: bool) {
        if success {
            self.tasks_completed += 1;
            self.total_time += elapsed_secs;
            self.avg_time = self.total_time / self.tasks_completed as f64;
        } else {
            self.failures += 1;
        }

        let finished = self.tasks_completed + self.failures;
        self.success_rate = if finished > 0 {
            self.tasks_completed as f64 / finished as f64
        } else {
            NO_HISTORY_SUCCESS_RATE
        };
    }

    pub fn finished(&self) -> u64 {
        self.tasks_completed + self.failures
    }
}

#[derive(Debug, Default)]
pub struct PerformanceTracker {
    stats: BTreeMap<NodeId, PerformanceStats>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a default record for a node if it has none. Existing history is kept.
    pub fn register(&mut self, node_id: &str) {
        self.stats.entry(node_id.to_string()).or_default();
    }

    /// Record a task outcome for a node, creating its record if needed.
    pub fn update(&mut self, node_id: &str, elapsed_secs: f64, success: bool) {
        let stats = self.stats.entry(node_id.to_string()).or_default();
        stats.record(elapsed_secs.max(0.0), success);
        debug!(
            %node_id,
            success,
            elapsed_secs,
            success_rate = stats.success_rate,
            avg_time = stats.avg_time,
            "performance updated"
        );
    }

    pub fn stats(&self, node_id: &str) -> Option<&PerformanceStats> {
        self.stats.get(node_id)
    }

    pub fn all(&self) -> &BTreeMap<NodeId, PerformanceStats> {
        &self.stats
    }
}
