//! FIFO task queue with claim and completion tracking.
//!
//! ```text
//!   enqueue ──► Pending ──claim_next──► Assigned ──complete──► Completed
//! ```
//!
//! There is no timeout or requeue: a task whose node never reports back
//! stays `Assigned`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fitgrid_core::{NodeId, TaskId, epoch_secs_f64};

use crate::tracker::PerformanceTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Assigned {
        node_id: NodeId,
        claimed_at: f64,
    },
    Completed {
        node_id: NodeId,
        elapsed_secs: f64,
        success: bool,
        result: Option<serde_json::Value>,
        completed_at: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub payload: serde_json::Value,
    pub created_at: f64,
    #[serde(flatten)]
    pub state: TaskState,
}

/// Queue depth by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug)]
pub struct TaskQueue {
    pending: VecDeque<TaskId>,
    tasks: BTreeMap<TaskId, Task>,
    next_id: TaskId,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pending task at the tail.
    pub fn enqueue(&mut self, payload: serde_json::Value) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;

        self.tasks.insert(
            id,
            Task {
                id,
                payload,
                created_at: epoch_secs_f64(),
                state: TaskState::Pending,
            },
        );
        self.pending.push_back(id);
        debug!(task_id = id, pending = self.pending.len(), "task enqueued");
        id
    }

    /// Pop the oldest pending task and assign it to `node_id`.
    pub fn claim_next(&mut self, node_id: &str) -> Option<Task> {
        let id = self.pending.pop_front()?;
        let task = self.tasks.get_mut(&id)?;
        task.state = TaskState::Assigned {
            node_id: node_id.to_string(),
            claimed_at: epoch_secs_f64(),
        };
        info!(task_id = id, %node_id, "task assigned");
        Some(task.clone())
    }

    /// Finish an assigned task and credit the claiming node's stats.
    ///
    /// Returns false, mutating nothing, unless the task is `Assigned`.
    pub fn complete(
        &mut self,
        task_id: TaskId,
        reporter: &str,
        result: Option<serde_json::Value>,
        success: bool,
        tracker: &mut PerformanceTracker,
    ) -> bool {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        let TaskState::Assigned {
            node_id,
            claimed_at,
        } = &task.state
        else {
            return false;
        };

        let node_id = node_id.clone();
        if node_id != reporter {
            warn!(task_id, claimant = %node_id, %reporter, "completion reported by a different node");
        }

        let now = epoch_secs_f64();
        let elapsed_secs = (now - claimed_at).max(0.0);
        tracker.update(&node_id, elapsed_secs, success);

        info!(task_id, %node_id, success, elapsed_secs, "task completed");
        task.state = TaskState::Completed {
            node_id,
            elapsed_secs,
            success,
            result,
            completed_at: now,
        };
        true
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn status(&self) -> QueueStatus {
        let mut status = QueueStatus {
            pending: self.pending.len(),
            ..Default::default()
        };
        for task in self.tasks.values() {
            match task.state {
                TaskState::Pending => {}
                TaskState::Assigned { .. } => status.active += 1,
                TaskState::Completed { .. } => status.completed += 1,
            }
        }
        status
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_are_fifo() {
        let mut queue = TaskQueue::new();
        let a = queue.enqueue(json!({"job": "A"}));
        let b = queue.enqueue(json!({"job": "B"}));
        assert_eq!((a, b), (1, 2));

        let first = queue.claim_next("n1").unwrap();
        let second = queue.claim_next("n2").unwrap();
        assert_eq!(first.id, a);
        assert_eq!(first.payload, json!({"job": "A"}));
        assert_eq!(second.id, b);
        assert!(queue.claim_next("n1").is_none());

        assert!(matches!(
            queue.get(a).unwrap().state,
            TaskState::Assigned { ref node_id, .. } if node_id == "n1"
        ));
    }

    #[test]
    fn complete_credits_claimant_and_transitions() {
        let mut queue = TaskQueue::new();
        let mut tracker = PerformanceTracker::new();
        let id = queue.enqueue(json!(null));
        queue.claim_next("n1");

        assert!(queue.complete(id, "n1", Some(json!("ok")), true, &mut tracker));
        let stats = tracker.stats("n1").unwrap();
        assert_eq!(stats.tasks_completed, 1);
        assert!(stats.total_time >= 0.0);

        match &queue.get(id).unwrap().state {
            TaskState::Completed {
                node_id,
                success,
                result,
                ..
            } => {
                assert_eq!(node_id, "n1");
                assert!(*success);
                assert_eq!(result, &Some(json!("ok")));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn complete_rejects_unknown_pending_and_finished_tasks() {
        let mut queue = TaskQueue::new();
        let mut tracker = PerformanceTracker::new();

        assert!(!queue.complete(42, "n1", None, true, &mut tracker));

        let id = queue.enqueue(json!(1));
        assert!(!queue.complete(id, "n1", None, true, &mut tracker));
        assert_eq!(queue.get(id).unwrap().state, TaskState::Pending);

        queue.claim_next("n1");
        assert!(queue.complete(id, "n1", None, false, &mut tracker));
        let before = tracker.stats("n1").cloned();
        assert!(!queue.complete(id, "n1", None, true, &mut tracker));
        assert_eq!(tracker.stats("n1").cloned(), before);
    }

    #[test]
    fn mismatched_reporter_still_credits_claimant() {
        let mut queue = TaskQueue::new();
        let mut tracker = PerformanceTracker::new();
        let id = queue.enqueue(json!(1));
        queue.claim_next("n1");

        assert!(queue.complete(id, "impostor", None, true, &mut tracker));
        assert_eq!(tracker.stats("n1").unwrap().tasks_completed, 1);
        assert!(tracker.stats("impostor").is_none());
    }

    #[test]
    fn status_counts_each_state() {
        let mut queue = TaskQueue::new();
        let mut tracker = PerformanceTracker::new();
        let a = queue.enqueue(json!(1));
        queue.enqueue(json!(2));
        queue.enqueue(json!(3));
        queue.claim_next("n1");
        queue.claim_next("n1");
        queue.complete(a, "n1", None, true, &mut tracker);

        assert_eq!(
            queue.status(),
            QueueStatus {
                pending: 1,
                active: 1,
                completed: 1
            }
        );
    }

    #[test]
    fn task_serializes_with_flat_status() {
        let mut queue = TaskQueue::new();
        let id = queue.enqueue(json!({"x": 1}));
        let value = serde_json::to_value(queue.get(id).unwrap()).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["id"], 1);
    }
}
