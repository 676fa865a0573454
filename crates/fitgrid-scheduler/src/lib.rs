//! fitgrid-scheduler — fitness-scored work assignment.
//!
//! The [`Coordinator`] is the single authority that decides which worker
//! node gets work. It composes:
//!
//! - **`registry`** — latest telemetry and energy rating per node
//! - **`tracker`** — per-node success rate and latency history
//! - **`scorer`** — multi-factor fitness score with hard safety cutoffs
//! - **`decision_log`** — append-only audit trail of selections
//! - **`queue`** — FIFO task queue with atomic claim / complete
//! - **`advisory`** — optional out-of-process recommendation seam
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   ├── RwLock<CoordinatorState>
//!   │     ├── NodeRegistry
//!   │     ├── PerformanceTracker
//!   │     ├── ScoringEngine ──writes──▶ DecisionLog
//!   │     └── TaskQueue ──feeds──▶ PerformanceTracker
//!   └── Option<Arc<dyn Advisor>> (called with the lock released)
//! ```

pub mod advisory;
pub mod coordinator;
pub mod decision_log;
pub mod error;
pub mod queue;
pub mod registry;
pub mod scorer;
pub mod tracker;

pub use advisory::{Advisor, AdvisoryError, AdvisoryFuture};
pub use coordinator::{Coordinator, NodeReport, Selection, StatusReport, TaskRequestOutcome};
pub use decision_log::{DecisionLog, DecisionRecord, SelectionMethod, WeightReview};
pub use error::{SchedulerError, SchedulerResult};
pub use queue::{QueueStatus, Task, TaskQueue, TaskState};
pub use registry::{Node, NodeRegistry};
pub use scorer::{ScoreBreakdown, ScoringEngine, SelectionResult};
pub use tracker::{PerformanceStats, PerformanceTracker};
