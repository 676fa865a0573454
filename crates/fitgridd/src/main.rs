//! fitgridd — the fitgrid coordinator daemon.
//!
//! Single binary that assembles the coordinator:
//! - Scoring weights and thresholds (fitgrid.toml + weights file)
//! - Node registry, task queue, performance tracker
//! - Optional LLM advisor
//! - Periodic status reporter
//! - REST API
//!
//! # Usage
//!
//! ```text
//! fitgridd serve --port 5000 --config fitgrid.toml --weights weights_config.json
//! fitgridd check-weights weights_config.json
//! ```

mod status_reporter;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use fitgrid_advisor::OllamaAdvisor;
use fitgrid_api::{ApiState, build_router};
use fitgrid_core::config::load_weights_file;
use fitgrid_core::{AdvisorConfig, CoordinatorConfig};
use fitgrid_scheduler::Coordinator;

use crate::status_reporter::StatusReporter;

#[derive(Parser)]
#[command(name = "fitgridd", about = "fitgrid coordinator daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator and its HTTP API.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Path to fitgrid.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Weights file loaded at startup and rewritten on updates.
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Status log interval in seconds.
        #[arg(long, default_value = "30")]
        status_interval: u64,

        /// Advisor endpoint; enables the advisor.
        #[arg(long)]
        advisor_url: Option<String>,

        /// Advisor model name.
        #[arg(long)]
        advisor_model: Option<String>,

        /// Advisor timeout in seconds.
        #[arg(long)]
        advisor_timeout: Option<u64>,
    },

    /// Validate a weights file and print it.
    CheckWeights {
        path: PathBuf,
    },
}

struct ServeArgs {
    port: u16,
    config: Option<PathBuf>,
    weights: Option<PathBuf>,
    status_interval: u64,
    advisor_url: Option<String>,
    advisor_model: Option<String>,
    advisor_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fitgridd=debug,fitgrid=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            config,
            weights,
            status_interval,
            advisor_url,
            advisor_model,
            advisor_timeout,
        } => {
            run_serve(ServeArgs {
                port,
                config,
                weights,
                status_interval,
                advisor_url,
                advisor_model,
                advisor_timeout,
            })
            .await
        }
        Command::CheckWeights { path } => check_weights(&path),
    }
}

fn check_weights(path: &Path) -> anyhow::Result<()> {
    let weights = load_weights_file(path)?;
    println!("{}", serde_json::to_string_pretty(&weights)?);
    println!("sum = {:.4}", weights.sum());
    Ok(())
}

/// Load fitgrid.toml and apply the weights file and CLI overrides on top.
fn resolve_config(args: &ServeArgs) -> anyhow::Result<CoordinatorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let config = CoordinatorConfig::from_file(path)?;
            info!(path = %path.display(), nodes = config.nodes.len(), "config loaded");
            config
        }
        None => CoordinatorConfig::default(),
    };

    if let Some(path) = &args.weights {
        if path.exists() {
            match load_weights_file(path) {
                Ok(weights) => {
                    info!(path = %path.display(), ?weights, "weights loaded");
                    config.weights = weights;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring invalid weights file"),
            }
        } else {
            info!(path = %path.display(), "weights file not found, will be created on update");
        }
    }

    if let Some(url) = &args.advisor_url {
        let advisor = config.advisor.get_or_insert_with(AdvisorConfig::default);
        advisor.url = url.clone();
        advisor.enabled = true;
    }
    if let Some(advisor) = config.advisor.as_mut() {
        if let Some(model) = &args.advisor_model {
            advisor.model = model.clone();
        }
        if let Some(timeout) = args.advisor_timeout {
            advisor.timeout_secs = timeout;
        }
    }

    Ok(config)
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("fitgrid coordinator starting");

    // ── Initialize subsystems ──────────────────────────────────

    let config = resolve_config(&args)?;

    let mut coordinator = Coordinator::from_config(&config)?;
    info!(nodes = config.nodes.len(), "coordinator initialized");

    if let Some(advisor) = config.active_advisor() {
        let client = OllamaAdvisor::new(&advisor.url, &advisor.model)?;
        info!(endpoint = %client.endpoint(), model = %advisor.model, timeout_secs = advisor.timeout_secs, "advisor enabled");
        coordinator = coordinator.with_advisor(Arc::new(client), Duration::from_secs(advisor.timeout_secs));
    }
    let coordinator = Arc::new(coordinator);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let reporter = StatusReporter::new(coordinator.clone(), Duration::from_secs(args.status_interval));
    let reporter_handle = tokio::spawn(async move {
        reporter.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let mut api_state = ApiState::new(coordinator);
    if let Some(path) = args.weights {
        api_state = api_state.with_weights_path(path);
    }
    let router = build_router(api_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

    server.await?;

    let _ = reporter_handle.await;

    info!("fitgrid coordinator stopped");
    Ok(())
}
