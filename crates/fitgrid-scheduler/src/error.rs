//! Scheduler error types.

use fitgrid_core::{CoreError, TaskId};
use thiserror::Error;

/// Errors that can occur during coordinator operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The task does not exist or is not currently assigned.
    #[error("task not found or not assigned: {0}")]
    TaskNotFound(TaskId),

    /// Weights or thresholds failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] CoreError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
