//! Coordinator — the shared aggregate every request handler talks to.
//!
//! All component state sits behind one `RwLock`. Mutations (telemetry,
//! claims, completions, selections) take the write lock; the status report
//! takes the read lock and so sees a consistent snapshot. The advisory
//! call is the only await made without the lock held.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use fitgrid_core::{
    CoordinatorConfig, DEFAULT_ENERGY_WATTS, NodeId, SystemLoad, TaskId, Telemetry, Thresholds,
    WeightVector, epoch_secs_f64, round3,
};

use crate::advisory::{Advisor, build_prompt, parse_recommendation};
use crate::decision_log::{DecisionLog, DecisionRecord, SelectionMethod, WeightReview};
use crate::error::{SchedulerError, SchedulerResult};
use crate::queue::{QueueStatus, Task, TaskQueue};
use crate::registry::NodeRegistry;
use crate::scorer::{ScoringEngine, SelectionResult};
use crate::tracker::{PerformanceStats, PerformanceTracker};

/// Default bound on a single advisory round trip.
pub const DEFAULT_ADVISOR_TIMEOUT: Duration = Duration::from_secs(30);

struct CoordinatorState {
    registry: NodeRegistry,
    tracker: PerformanceTracker,
    scorer: ScoringEngine,
    log: DecisionLog,
    queue: TaskQueue,
}

pub struct Coordinator {
    state: RwLock<CoordinatorState>,
    advisor: Option<Arc<dyn Advisor>>,
    advisor_timeout: Duration,
}

/// Answer to a worker asking for work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskRequestOutcome {
    Assigned { task: Task },
    /// The node's current score is below the admission bar.
    Rejected { score: f64, threshold: f64 },
    NoTasks,
}

/// Result of [`Coordinator::best_node`] and [`Coordinator::best_node_advised`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub node_id: Option<NodeId>,
    pub score: f64,
    pub scores: BTreeMap<NodeId, f64>,
    pub method: SelectionMethod,
    pub system_load: SystemLoad,
}

/// Per-node view in a [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub energy_watts: f64,
    pub telemetry: Option<Telemetry>,
    /// Score at normal load, rounded to three places. `None` without telemetry.
    pub score: Option<f64>,
    pub last_seen: Option<u64>,
    pub performance: Option<PerformanceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub timestamp: f64,
    pub registered_nodes: usize,
    /// Nodes that have reported telemetry.
    pub total_nodes: usize,
    pub nodes: BTreeMap<NodeId, NodeReport>,
    pub queue: QueueStatus,
    pub weights: WeightVector,
}

impl Coordinator {
    /// Build a coordinator with no nodes and no advisor.
    pub fn new(weights: WeightVector, thresholds: Thresholds) -> SchedulerResult<Self> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self {
            state: RwLock::new(CoordinatorState {
                registry: NodeRegistry::new(),
                tracker: PerformanceTracker::new(),
                scorer: ScoringEngine::new(weights, thresholds),
                log: DecisionLog::new(),
                queue: TaskQueue::new(),
            }),
            advisor: None,
            advisor_timeout: DEFAULT_ADVISOR_TIMEOUT,
        })
    }

    /// Build a coordinator from a parsed config file, pre-registering its nodes.
    pub fn from_config(config: &CoordinatorConfig) -> SchedulerResult<Self> {
        let mut coordinator = Self::new(config.weights, config.thresholds)?;
        let state = coordinator.state.get_mut();
        for seed in &config.nodes {
            state.registry.upsert(&seed.id, seed.energy_watts);
            state.tracker.register(&seed.id);
        }
        Ok(coordinator)
    }

    /// Attach an advisor consulted by [`Coordinator::best_node_advised`].
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>, timeout: Duration) -> Self {
        self.advisor = Some(advisor);
        self.advisor_timeout = timeout;
        self
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Register a node or update its energy rating. Returns true if new.
    pub async fn register_node(&self, node_id: &str, energy_watts: f64) -> bool {
        let mut state = self.state.write().await;
        let created = state.registry.upsert(node_id, energy_watts);
        state.tracker.register(node_id);
        created
    }

    /// Store a node's latest telemetry. Returns true if the node was unseen.
    pub async fn report_telemetry(&self, node_id: &str, telemetry: Telemetry) -> bool {
        let mut state = self.state.write().await;

        let warning = state.scorer.thresholds().temp_warning;
        if let Some(temp) = telemetry.cpu_temp.filter(|t| *t > warning) {
            warn!(%node_id, cpu_temp = temp, "node running hot");
        }
        debug!(
            %node_id,
            cpu = telemetry.cpu_percent,
            ram = telemetry.ram_percent,
            temp = ?telemetry.cpu_temp,
            "telemetry received"
        );

        let created = state.registry.record_telemetry(node_id, telemetry);
        if created {
            state.tracker.register(node_id);
        }
        created
    }

    // ── Tasks ──────────────────────────────────────────────────────

    pub async fn submit_task(&self, payload: serde_json::Value) -> TaskId {
        let mut state = self.state.write().await;
        let id = state.queue.enqueue(payload);
        info!(task_id = id, pending = state.queue.pending_len(), "task submitted");
        id
    }

    /// Admission check and claim in one critical section.
    ///
    /// A node that has never reported telemetry is admitted. A rejected
    /// node consumes no task.
    pub async fn request_task(&self, node_id: &str) -> TaskRequestOutcome {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let Some(telemetry) = state.registry.snapshot(node_id) {
            let score = state.scorer.score(
                node_id,
                telemetry,
                SystemLoad::Normal,
                &state.registry,
                &state.tracker,
            );
            let threshold = state.scorer.thresholds().admission;
            if score < threshold {
                warn!(%node_id, score, threshold, "task request rejected");
                return TaskRequestOutcome::Rejected { score, threshold };
            }
        }

        match state.queue.claim_next(node_id) {
            Some(task) => TaskRequestOutcome::Assigned { task },
            None => TaskRequestOutcome::NoTasks,
        }
    }

    /// Complete an assigned task and credit the claiming node.
    pub async fn report_completion(
        &self,
        task_id: TaskId,
        node_id: &str,
        result: Option<serde_json::Value>,
        success: bool,
    ) -> SchedulerResult<Task> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if !state
            .queue
            .complete(task_id, node_id, result, success, &mut state.tracker)
        {
            return Err(SchedulerError::TaskNotFound(task_id));
        }
        state
            .queue
            .get(task_id)
            .cloned()
            .ok_or(SchedulerError::TaskNotFound(task_id))
    }

    /// Feed a task outcome to the tracker without a queued task.
    ///
    /// An unknown node is registered at the default energy rating.
    pub async fn record_performance(&self, node_id: &str, task_time_secs: f64, success: bool) {
        let mut state = self.state.write().await;
        if !state.registry.contains(node_id) {
            state.registry.upsert(node_id, DEFAULT_ENERGY_WATTS);
        }
        state.tracker.update(node_id, task_time_secs, success);
    }

    pub async fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.state.read().await.queue.get(task_id).cloned()
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Pick the fittest node by score alone. Never consults the advisor.
    pub async fn best_node(&self, load: SystemLoad) -> Selection {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let result = state
            .scorer
            .select_best(load, &state.registry, &state.tracker, &mut state.log);
        Selection::scored(result, load)
    }

    /// Pick the fittest node, letting the advisor override the score.
    ///
    /// The advisor only runs when at least one node was scored. Its pick is
    /// accepted if it names a scored node with a nonzero score, and is then
    /// logged as a second, advisory decision. Any error, timeout, or
    /// unrecognized answer keeps the scoring result.
    pub async fn best_node_advised(&self, load: SystemLoad) -> Selection {
        let (result, prompt) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let result =
                state
                    .scorer
                    .select_best(load, &state.registry, &state.tracker, &mut state.log);
            let prompt = (self.advisor.is_some() && !result.scores.is_empty())
                .then(|| build_prompt(load, &result, &state.registry, &state.tracker));
            (result, prompt)
        };

        let (Some(advisor), Some(prompt)) = (&self.advisor, prompt) else {
            return Selection::scored(result, load);
        };

        match tokio::time::timeout(self.advisor_timeout, advisor.recommend(&prompt)).await {
            Ok(Ok(answer)) => match parse_recommendation(&answer, result.scores.keys()) {
                Some(node_id) => {
                    let score = result.scores.get(&node_id).copied().unwrap_or(0.0);
                    if score > 0.0 {
                        info!(%node_id, score, %load, "advisor recommendation accepted");
                        let selection = Selection {
                            node_id: Some(node_id),
                            score,
                            scores: result.scores,
                            method: SelectionMethod::Advisory,
                            system_load: load,
                        };
                        self.state.write().await.log.append(selection.to_record());
                        return selection;
                    }
                    warn!(%node_id, "advisor picked a node past its safety cutoffs");
                }
                None => {
                    let first_line = answer.lines().next().unwrap_or_default();
                    warn!(answer = first_line, "advisor answer names no known node");
                }
            },
            Ok(Err(e)) => warn!(error = %e, "advisor failed, using scoring result"),
            Err(_) => warn!(
                timeout_ms = self.advisor_timeout.as_millis() as u64,
                "advisor timed out, using scoring result"
            ),
        }

        Selection::scored(result, load)
    }

    // ── Weights & audit ────────────────────────────────────────────

    pub async fn weights(&self) -> WeightVector {
        self.state.read().await.scorer.weights()
    }

    /// Replace weights from a key-value mapping. Invalid input keeps the
    /// previous weights.
    pub async fn load_weights(&self, mapping: &BTreeMap<String, f64>) -> SchedulerResult<WeightVector> {
        let weights = WeightVector::from_map(mapping).inspect_err(|e| {
            warn!(error = %e, "rejected weight update");
        })?;
        self.set_weights(weights).await?;
        Ok(weights)
    }

    pub async fn set_weights(&self, weights: WeightVector) -> SchedulerResult<()> {
        let mut state = self.state.write().await;
        state.scorer.set_weights(weights)?;
        info!(?weights, "scoring weights updated");
        Ok(())
    }

    pub async fn recent_decisions(&self, n: usize) -> Vec<DecisionRecord> {
        self.state.read().await.log.recent(n).to_vec()
    }

    pub async fn review_weights(&self) -> WeightReview {
        let state = self.state.read().await;
        let review = state.scorer.review_weights(&state.log);
        debug!(?review, "weight review");
        review
    }

    // ── Reporting ──────────────────────────────────────────────────

    /// Consistent snapshot of every node, its score, and the queue.
    pub async fn status_report(&self) -> StatusReport {
        let state = self.state.read().await;

        let nodes: BTreeMap<NodeId, NodeReport> = state
            .registry
            .nodes()
            .map(|node| {
                let score = node.telemetry.as_ref().map(|t| {
                    round3(state.scorer.score(
                        &node.node_id,
                        t,
                        SystemLoad::Normal,
                        &state.registry,
                        &state.tracker,
                    ))
                });
                let report = NodeReport {
                    energy_watts: node.energy_watts,
                    telemetry: node.telemetry.clone(),
                    score,
                    last_seen: node.last_seen,
                    performance: state.tracker.stats(&node.node_id).cloned(),
                };
                (node.node_id.clone(), report)
            })
            .collect();

        StatusReport {
            timestamp: epoch_secs_f64(),
            registered_nodes: state.registry.len(),
            total_nodes: nodes.values().filter(|n| n.telemetry.is_some()).count(),
            nodes,
            queue: state.queue.status(),
            weights: state.scorer.weights(),
        }
    }
}

impl Selection {
    fn scored(result: SelectionResult, load: SystemLoad) -> Self {
        Self {
            node_id: result.node_id,
            score: result.score,
            scores: result.scores,
            method: SelectionMethod::Scoring,
            system_load: load,
        }
    }

    fn to_record(&self) -> DecisionRecord {
        DecisionRecord {
            timestamp: epoch_secs_f64(),
            selected_node: self.node_id.clone(),
            score: self.score,
            all_scores: self.scores.clone(),
            system_load: self.system_load,
            method: self.method,
        }
    }
}
