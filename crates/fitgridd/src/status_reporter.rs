//! Periodic cluster status log.

use std::sync::Arc;
use std::time::Duration;

use fitgrid_scheduler::Coordinator;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct StatusReporter {
    coordinator: Arc<Coordinator>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Log a status line per node every interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "status reporter started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.report().await;
                }
                _ = shutdown.changed() => {
                    info!("status reporter shutting down");
                    break;
                }
            }
        }
    }

    /// Emit one round of status logs. Returns the number of nodes with telemetry.
    pub async fn report(&self) -> usize {
        let report = self.coordinator.status_report().await;
        if report.total_nodes == 0 {
            debug!(registered = report.registered_nodes, "no node telemetry yet");
            return 0;
        }

        info!(
            nodes = report.total_nodes,
            pending = report.queue.pending,
            active = report.queue.active,
            completed = report.queue.completed,
            "cluster status"
        );
        for (node_id, node) in &report.nodes {
            let (Some(telemetry), Some(score)) = (&node.telemetry, node.score) else {
                continue;
            };
            info!(
                %node_id,
                cpu = telemetry.cpu_percent,
                ram = telemetry.ram_percent,
                temp = ?telemetry.cpu_temp,
                score,
                "node status"
            );
        }

        let review = self.coordinator.review_weights().await;
        debug!(?review, "weight review");
        report.total_nodes
    }
}
