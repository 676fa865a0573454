//! Node fitness scoring.
//!
//! Each node with telemetry gets a score in `[0.0, 1.0]` built from five
//! sub-scores:
//! - **CPU availability**: `(100 - cpu_percent) / 100`
//! - **RAM availability**: `(100 - ram_percent) / 100`
//! - **Temperature**: distance below `temp_max`, neutral 0.5 when unknown
//! - **Energy efficiency**: `1 - watts / max_watts` across registered nodes
//! - **History**: the node's success rate, neutral 0.5 when untracked
//!
//! Nodes past any hard cutoff (temperature, RAM, CPU) score exactly 0.0 and
//! are never selected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fitgrid_core::{NodeId, SystemLoad, Telemetry, Thresholds, WeightVector, epoch_secs_f64};

use crate::decision_log::{DecisionLog, DecisionRecord, SelectionMethod, WeightReview};
use crate::registry::NodeRegistry;
use crate::tracker::PerformanceTracker;

/// Sub-score used when a signal is unavailable.
const NEUTRAL_SUBSCORE: f64 = 0.5;

/// Decision records examined by the weight review.
const REVIEW_WINDOW: usize = 100;

/// Minimum decision records before the weight review considers acting.
const REVIEW_MIN_RECORDS: usize = 10;

/// Individual score components, before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cpu: f64,
    pub ram: f64,
    pub temperature: f64,
    pub energy: f64,
    pub history: f64,
}

impl ScoreBreakdown {
    fn weighted(&self, w: &WeightVector) -> f64 {
        w.cpu_availability * self.cpu
            + w.ram_availability * self.ram
            + w.temperature * self.temperature
            + w.energy_efficiency * self.energy
            + w.historical_performance * self.history
    }
}

/// Outcome of [`ScoringEngine::select_best`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub node_id: Option<NodeId>,
    pub score: f64,
    pub scores: BTreeMap<NodeId, f64>,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: WeightVector,
    thresholds: Thresholds,
}

impl ScoringEngine {
    pub fn new(weights: WeightVector, thresholds: Thresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    pub fn weights(&self) -> WeightVector {
        self.weights
    }

    /// Replace the active weights. The vector is validated first; on error
    /// the previous weights stay in effect.
    pub fn set_weights(&mut self, weights: WeightVector) -> fitgrid_core::CoreResult<()> {
        weights.validate()?;
        self.weights = weights;
        Ok(())
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// True if the telemetry trips a hard safety cutoff.
    pub fn is_cut_off(&self, telemetry: &Telemetry) -> bool {
        let t = &self.thresholds;
        telemetry.cpu_temp.is_some_and(|temp| temp > t.temp_max)
            || telemetry.ram_percent > t.ram_critical
            || telemetry.cpu_percent > t.cpu_critical
    }

    /// Sub-scores for a node, or `None` if it is past a hard cutoff.
    pub fn breakdown(
        &self,
        node_id: &str,
        telemetry: &Telemetry,
        registry: &NodeRegistry,
        tracker: &PerformanceTracker,
    ) -> Option<ScoreBreakdown> {
        if self.is_cut_off(telemetry) {
            return None;
        }

        let temp_max = self.thresholds.temp_max;
        let temperature = match telemetry.cpu_temp {
            Some(temp) if temp_max > 0.0 => (temp_max - temp) / temp_max,
            Some(_) => 0.0,
            None => NEUTRAL_SUBSCORE,
        };

        let max_watts = registry.max_energy_watts();
        let energy = if max_watts > 0.0 {
            1.0 - registry.energy_watts(node_id) / max_watts
        } else {
            0.0
        };

        let history = tracker
            .stats(node_id)
            .map(|s| s.success_rate)
            .unwrap_or(NEUTRAL_SUBSCORE);

        Some(ScoreBreakdown {
            cpu: unit((100.0 - telemetry.cpu_percent) / 100.0),
            ram: unit((100.0 - telemetry.ram_percent) / 100.0),
            temperature: unit(temperature),
            energy: unit(energy),
            history: unit(history),
        })
    }

    /// Fitness of one node under the given load, in `[0.0, 1.0]`.
    pub fn score(
        &self,
        node_id: &str,
        telemetry: &Telemetry,
        load: SystemLoad,
        registry: &NodeRegistry,
        tracker: &PerformanceTracker,
    ) -> f64 {
        match self.breakdown(node_id, telemetry, registry, tracker) {
            Some(parts) => unit(parts.weighted(&self.weights.for_load(load))),
            None => 0.0,
        }
    }

    /// Score every node with telemetry and pick the fittest.
    ///
    /// Ties go to the lowest node id. A node scoring 0.0 is never chosen.
    /// The outcome is always appended to `log`.
    pub fn select_best(
        &self,
        load: SystemLoad,
        registry: &NodeRegistry,
        tracker: &PerformanceTracker,
        log: &mut DecisionLog,
    ) -> SelectionResult {
        let mut scores = BTreeMap::new();
        let mut best: Option<(&NodeId, f64)> = None;

        for (node_id, telemetry) in registry.all_snapshots() {
            let score = self.score(node_id, telemetry, load, registry, tracker);
            scores.insert(node_id.clone(), score);

            if score > 0.0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((node_id, score));
            }
        }

        let (node_id, score) = match best {
            Some((id, score)) => (Some(id.clone()), score),
            None => (None, 0.0),
        };

        debug!(
            selected = node_id.as_deref().unwrap_or("-"),
            score,
            candidates = scores.len(),
            %load,
            "node selection"
        );

        log.append(DecisionRecord {
            timestamp: epoch_secs_f64(),
            selected_node: node_id.clone(),
            score,
            all_scores: scores.clone(),
            system_load: load,
            method: SelectionMethod::Scoring,
        });

        SelectionResult {
            node_id,
            score,
            scores,
        }
    }

    /// Examine recent decisions for a weight adjustment. Currently never adjusts.
    pub fn review_weights(&self, log: &DecisionLog) -> WeightReview {
        let window = log.recent(REVIEW_WINDOW);
        if window.len() < REVIEW_MIN_RECORDS {
            return WeightReview::InsufficientHistory {
                available: window.len(),
                required: REVIEW_MIN_RECORDS,
            };
        }
        WeightReview::NoAdjustment {
            examined: window.len(),
        }
    }
}

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
