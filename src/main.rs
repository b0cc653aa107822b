//! fleetd agent daemon
//!
//! Polls the coordinator for status and work assignments, dispatching
//! builds, pipelines, upgrades, and debug containers as independent tasks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleetd::agent::{Agent, ExitReason};
use fleetd::config::Config;
use fleetd::coordinator::HttpCoordinator;
use fleetd::dispatch::Dispatcher;
use fleetd::executor::{LifecycleManager, ProcessExecutor, TaskExecutor};
use fleetd::shutdown::ShutdownSignal;
use fleetd::state::AgentState;
use fleetd::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "fleetd")]
#[command(about = "Fleet agent: polls the coordinator and runs assigned work")]
#[command(version)]
struct Args {
    /// Path to the agent configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(
        Config::load(args.config.as_deref()).context("Failed to load configuration")?,
    );

    info!(
        coordinator = %config.coordinator_url,
        agent = %config.agent_id,
        "Loaded configuration"
    );

    let shutdown = ShutdownSignal::new();
    let supervisor = Supervisor::new();
    let state = AgentState::new();

    let coordinator = Arc::new(
        HttpCoordinator::new(&config).context("Failed to build coordinator client")?,
    );
    let executor = Arc::new(ProcessExecutor::new(
        config.worker.clone(),
        state.clone(),
        shutdown.clone(),
    ));
    let tasks: Arc<dyn TaskExecutor> = executor.clone();
    let lifecycle: Arc<dyn LifecycleManager> = executor;
    let dispatcher = Dispatcher::new(tasks, supervisor.clone());

    let agent = Agent::new(
        config,
        coordinator,
        dispatcher,
        lifecycle,
        shutdown,
        supervisor,
        state,
    );

    match agent.run().await {
        ExitReason::Deleted => {
            info!("Agent decommissioned, exiting");
            Ok(())
        }
        ExitReason::Fatal(code) => {
            info!(code, "Exiting with requested code");
            std::process::exit(code);
        }
    }
}
