//! fitgrid-advisor — LLM-backed node recommendations.
//!
//! [`OllamaAdvisor`] implements the scheduler's `Advisor` seam against an
//! Ollama-compatible `/api/generate` endpoint. The coordinator owns the
//! timeout and the fallback; this crate only speaks HTTP.

pub mod error;
pub mod ollama;

pub use error::{SetupError, SetupResult};
pub use ollama::OllamaAdvisor;
