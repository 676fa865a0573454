//! Advisory seam: an optional external recommender consulted after scoring.
//!
//! The coordinator hands an [`Advisor`] a prompt describing every scored
//! node and reads a node id back from the first line of the answer. Any
//! failure is the caller's cue to fall back to the plain scoring result.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use fitgrid_core::{NodeId, SystemLoad, round3};

use crate::registry::NodeRegistry;
use crate::scorer::SelectionResult;
use crate::tracker::PerformanceTracker;

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisor unreachable: {0}")]
    Unavailable(String),

    #[error("advisor returned HTTP {0}")]
    Status(u16),

    #[error("malformed advisor response: {0}")]
    BadResponse(String),

    #[error("advisor timed out")]
    Timeout,
}

pub type AdvisoryFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AdvisoryError>> + Send + 'a>>;

/// An external service that recommends a node given a textual prompt.
pub trait Advisor: Send + Sync {
    /// Return the advisor's free-text answer to `prompt`.
    fn recommend<'a>(&'a self, prompt: &'a str) -> AdvisoryFuture<'a>;
}

/// Describe the scored nodes and ask for a single node id on the first line.
pub fn build_prompt(
    load: SystemLoad,
    selection: &SelectionResult,
    registry: &NodeRegistry,
    tracker: &PerformanceTracker,
) -> String {
    let mut prompt = String::from(
        "You are the scheduler of a distributed compute cluster. \
         Choose the best node for the next task.\n\n",
    );
    let _ = writeln!(prompt, "System load: {load}");
    let _ = writeln!(prompt, "Nodes:");

    for (node_id, score) in &selection.scores {
        let Some(telemetry) = registry.snapshot(node_id) else {
            continue;
        };
        let temp = telemetry
            .cpu_temp
            .map(|t| format!("{t:.1}C"))
            .unwrap_or_else(|| "unknown".to_string());
        let (tasks, success_rate) = tracker
            .stats(node_id)
            .map(|s| (s.tasks_completed, s.success_rate))
            .unwrap_or((0, 0.5));

        let _ = writeln!(
            prompt,
            "- {node_id}: cpu {:.1}%, ram {:.1}%, temp {temp}, energy {:.0}W, \
             tasks completed {tasks}, success rate {:.2}, score {:.3}",
            telemetry.cpu_percent,
            telemetry.ram_percent,
            registry.energy_watts(node_id),
            success_rate,
            round3(*score),
        );
    }

    if let Some(best) = &selection.node_id {
        let _ = writeln!(
            prompt,
            "\nThe scoring system suggests {best} (score {:.3}).",
            round3(selection.score)
        );
    }
    prompt.push_str(
        "\nAnswer with the name of the chosen node on the first line, \
         then a one-sentence reason.",
    );
    prompt
}

/// Match the first line of an advisor answer against candidate node ids.
///
/// Matching is a case-insensitive substring test. Longer ids are tried
/// first so that `node_10` wins over `node_1`.
pub fn parse_recommendation<'a, I>(text: &str, candidates: I) -> Option<NodeId>
where
    I: IntoIterator<Item = &'a NodeId>,
{
    let first_line = text.trim().lines().next()?.to_lowercase();
    if first_line.is_empty() {
        return None;
    }

    let mut ids: Vec<&NodeId> = candidates.into_iter().collect();
    ids.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    ids.into_iter()
        .find(|id| first_line.contains(&id.to_lowercase()))
        .cloned()
}
