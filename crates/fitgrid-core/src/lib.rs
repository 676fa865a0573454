//! fitgrid-core — shared types for the fitgrid coordinator.
//!
//! Holds the vocabulary every other crate speaks: node telemetry, the
//! system-load hint, the validated five-factor [`WeightVector`], scoring
//! [`Thresholds`], and the `fitgrid.toml` configuration file.

pub mod config;
pub mod error;
pub mod types;
pub mod weights;

pub use config::{AdvisorConfig, CoordinatorConfig, NodeSeed};
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use weights::WeightVector;
