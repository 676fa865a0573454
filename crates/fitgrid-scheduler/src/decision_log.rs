//! Append-only record of selection outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fitgrid_core::{NodeId, SystemLoad};

/// How a selection was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    Scoring,
    /// The advisor overrode the scoring result.
    Advisory,
}

/// One selection outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: f64,
    pub selected_node: Option<NodeId>,
    pub score: f64,
    pub all_scores: BTreeMap<NodeId, f64>,
    pub system_load: SystemLoad,
    #[serde(default)]
    pub method: SelectionMethod,
}

/// Outcome of the weight-review hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeightReview {
    /// Fewer records than the review requires.
    InsufficientHistory { available: usize, required: usize },
    /// Enough records were examined; weights were left as they are.
    NoAdjustment { examined: usize },
}

#[derive(Debug, Default)]
pub struct DecisionLog {
    records: Vec<DecisionRecord>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    /// The trailing `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[DecisionRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: &str, score: f64) -> DecisionRecord {
        DecisionRecord {
            timestamp: 0.0,
            selected_node: Some(node.to_string()),
            score,
            all_scores: BTreeMap::new(),
            system_load: SystemLoad::Normal,
            method: SelectionMethod::Scoring,
        }
    }

    #[test]
    fn recent_returns_trailing_window_oldest_first() {
        let mut log = DecisionLog::new();
        for i in 0..5 {
            log.append(record(&format!("n{i}"), i as f64));
        }

        let window = log.recent(3);
        let ids: Vec<_> = window
            .iter()
            .map(|r| r.selected_node.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["n2", "n3", "n4"]);
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn recent_larger_than_log_returns_everything() {
        let mut log = DecisionLog::new();
        log.append(record("a", 0.5));
        assert_eq!(log.recent(100).len(), 1);
        assert!(DecisionLog::new().recent(10).is_empty());
    }
}
