//! fitgrid-api — REST API for the fitgrid coordinator.
//!
//! Workers push telemetry and pull tasks; operators submit work, inspect
//! scores, and tune weights. Every response uses the
//! `{success, data?, error?}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness |
//! | POST | `/register` | Register a node and its energy rating |
//! | POST | `/update_metrics` | Push node telemetry |
//! | POST | `/tasks` | Submit a task |
//! | GET | `/tasks/{id}` | Look up a task |
//! | POST | `/request_task` | Claim the next task (admission checked) |
//! | POST | `/complete_task` | Report a task outcome |
//! | POST | `/update_performance` | Report out-of-band work |
//! | GET | `/get_best_node` | Fittest node for `?system_load=`, score only |
//! | GET | `/get_best_node_advised` | Same, with the advisor allowed to override |
//! | GET | `/status` | Cluster snapshot |
//! | GET | `/decisions` | Recent selections (`?limit=`) |
//! | GET, PUT | `/weights` | Read or replace scoring weights |

pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fitgrid_scheduler::Coordinator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
    /// Where accepted weight updates are written back, if anywhere.
    pub weights_path: Option<PathBuf>,
}

impl ApiState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            weights_path: None,
        }
    }

    pub fn with_weights_path(mut self, path: PathBuf) -> Self {
        self.weights_path = Some(path);
        self
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::register_node))
        .route("/update_metrics", post(handlers::update_metrics))
        .route("/tasks", post(handlers::submit_task))
        .route("/tasks/{id}", get(handlers::get_task))
        .route("/request_task", post(handlers::request_task))
        .route("/complete_task", post(handlers::complete_task))
        .route("/update_performance", post(handlers::update_performance))
        .route("/get_best_node", get(handlers::get_best_node))
        .route("/get_best_node_advised", get(handlers::get_best_node_advised))
        .route("/status", get(handlers::status))
        .route("/decisions", get(handlers::recent_decisions))
        .route("/weights", get(handlers::get_weights).put(handlers::put_weights))
        .with_state(state)
}
