//! The poll-decide-dispatch control loop.
//!
//! One fixed-interval cycle: compute capabilities, snapshot local state,
//! ask the coordinator, classify its answer, dispatch assigned work. Every
//! locally recoverable failure reduces to log-and-retry; the loop leaves
//! only on remote deletion or a task-requested shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::dispatch::Dispatcher;
use crate::executor::LifecycleManager;
use crate::protocol::{AskEnable, AskRequest, BuildKind, HeartbeatInfo, UpgradeInfo};
use crate::shutdown::ShutdownSignal;
use crate::state::AgentState;
use crate::status::{classify, StatusDecision};
use crate::supervisor::{Supervisor, TaskKind};

/// Why the control loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Coordinator decommissioned this agent; uninstall has run.
    Deleted,
    /// A task requested shutdown with this exit code.
    Fatal(i32),
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    /// The assignment (possibly empty) was dispatched.
    Dispatched,
    /// Soft failure or not-ready status; ask again next cycle.
    Retry,
    /// Remote decommission.
    Deleted,
}

/// The control loop and its collaborators.
pub struct Agent {
    config: Arc<Config>,
    coordinator: Arc<dyn Coordinator>,
    dispatcher: Dispatcher,
    lifecycle: Arc<dyn LifecycleManager>,
    shutdown: ShutdownSignal,
    supervisor: Supervisor,
    state: AgentState,
    interval: Duration,
}

impl Agent {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        coordinator: Arc<dyn Coordinator>,
        dispatcher: Dispatcher,
        lifecycle: Arc<dyn LifecycleManager>,
        shutdown: ShutdownSignal,
        supervisor: Supervisor,
        state: AgentState,
    ) -> Self {
        let interval = Duration::from_secs(config.poll_interval_secs);
        Self {
            config,
            coordinator,
            dispatcher,
            lifecycle,
            shutdown,
            supervisor,
            state,
            interval,
        }
    }

    /// Drive the loop until the coordinator deletes the agent or a task
    /// requests shutdown. The returned reason maps to the process exit.
    pub async fn run(&self) -> ExitReason {
        let (startup, _) = self.snapshot(false);
        if let Err(e) = self.coordinator.report_startup(&startup).await {
            warn!(error = %e, "Startup report failed, continuing anyway");
        }
        info!(agent = %self.config.agent_id, version = %crate::VERSION, "Agent loop started");

        loop {
            let cycle = self.poll_once().await;

            if cycle == Cycle::Deleted {
                info!("Agent deleted by coordinator, uninstalling");
                if let Err(e) = self.lifecycle.uninstall().await {
                    error!(error = %e, "Uninstall failed");
                }
                return ExitReason::Deleted;
            }

            // Checked on every cycle, dispatch and retry alike, so a signal
            // raised mid-cycle is honored before the next ask goes out
            if let Some(code) = self.shutdown.requested() {
                let reason = self.shutdown.reason().unwrap_or_default();
                info!(code, reason = %reason, "Shutdown requested, leaving loop");
                return ExitReason::Fatal(code);
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One poll cycle: snapshot, ask, classify, decode, dispatch.
    async fn poll_once(&self) -> Cycle {
        let enable = self.capabilities();
        let (heart, upgrade) = self.snapshot(enable.upgrade);
        let request = AskRequest {
            enable,
            heart,
            upgrade,
        };

        let result = match self.coordinator.ask(&request).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Ask failed");
                return Cycle::Retry;
            }
        };

        if !result.ok {
            warn!(message = %result.message, "Coordinator rejected the request");
            return Cycle::Retry;
        }

        match classify(result.agent_status) {
            StatusDecision::Deleted => return Cycle::Deleted,
            StatusDecision::Continue => {
                debug!(status = ?result.agent_status, "Agent not ready yet");
                return Cycle::Retry;
            }
            StatusDecision::Error => {
                warn!(status = ?result.agent_status, "Unexpected agent status");
                return Cycle::Retry;
            }
            StatusDecision::Ready => {}
        }

        let resp = match result.decode() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Undecodable work assignment");
                return Cycle::Retry;
            }
        };

        self.dispatcher.dispatch(enable, resp);
        Cycle::Dispatched
    }

    /// Capability flags for this cycle, narrowed by coordinator-pushed
    /// settings and by an upgrade already in flight.
    fn capabilities(&self) -> AskEnable {
        let caps = &self.config.capabilities;
        let settings = self.state.server_settings();

        // A pushed count of zero pauses intake for that build kind
        let binary = caps.enable_build && settings.parallel_task_count != Some(0);
        let docker = caps.enable_docker_build && settings.docker_parallel_task_count != Some(0);
        let build = match (binary, docker) {
            (true, true) => BuildKind::All,
            (true, false) => BuildKind::Binary,
            (false, true) => BuildKind::Docker,
            (false, false) => BuildKind::None,
        };

        // Do not volunteer for another upgrade while one is running
        let upgrade =
            caps.enable_upgrade && self.supervisor.in_flight(TaskKind::Upgrade) == 0;

        AskEnable {
            build,
            upgrade,
            pipeline: caps.enable_pipeline,
            docker_debug: caps.enable_docker_debug,
        }
    }

    /// Fresh local snapshots for the outbound request. Upgrade info is
    /// attached only while the upgrade capability is on.
    fn snapshot(&self, upgrade_enabled: bool) -> (HeartbeatInfo, Option<UpgradeInfo>) {
        let heart = HeartbeatInfo {
            agent_id: self.config.agent_id.clone(),
            agent_version: crate::VERSION.to_string(),
            hostname: self.config.hostname(),
            running_builds: self.supervisor.in_flight(TaskKind::Build),
            running_pipelines: self.supervisor.in_flight(TaskKind::Pipeline),
            running_debug_containers: self.supervisor.in_flight(TaskKind::DockerDebug),
        };
        let upgrade = upgrade_enabled.then(|| UpgradeInfo {
            agent_version: crate::VERSION.to_string(),
            worker_version: self.config.worker.worker_version.clone(),
        });
        (heart, upgrade)
    }
}
