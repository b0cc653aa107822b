//! Worker-process execution of assigned tasks.
//!
//! Each task kind maps to a configured shell command. The descriptor
//! travels to the child as JSON in `FLEETD_TASK_PAYLOAD`; the child owns
//! the work from there. A non-zero exit is a task failure, reported by the
//! supervisor.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{LifecycleManager, TaskExecutor};
use crate::config::WorkerConfig;
use crate::protocol::{
    BuildDescriptor, DebugDescriptor, HeartbeatDescriptor, PipelineDescriptor, UpgradeDescriptor,
};
use crate::shutdown::{ShutdownSignal, EXIT_CODE_RESTART};
use crate::state::AgentState;

/// Launches configured worker commands for assigned tasks.
pub struct ProcessExecutor {
    worker: WorkerConfig,
    state: AgentState,
    shutdown: ShutdownSignal,
}

impl ProcessExecutor {
    #[must_use]
    pub const fn new(worker: WorkerConfig, state: AgentState, shutdown: ShutdownSignal) -> Self {
        Self {
            worker,
            state,
            shutdown,
        }
    }

    /// Run one worker command to completion with the task payload in its
    /// environment. Returns the child's exit code.
    #[instrument(skip(self, payload, extra_env))]
    async fn run_worker<T: Serialize + Sync>(
        &self,
        kind: &'static str,
        command: Option<&str>,
        payload: &T,
        extra_env: &[(&str, String)],
    ) -> Result<i32> {
        let command = command.with_context(|| format!("No {kind} command configured"))?;
        let payload_json =
            serde_json::to_string(payload).context("Failed to encode task payload")?;

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(command)
            .env("FLEETD_TASK_KIND", kind)
            .env("FLEETD_TASK_PAYLOAD", &payload_json)
            .stdin(Stdio::null());
        if let Some(dir) = &self.worker.workspace {
            cmd.current_dir(dir);
        }
        for (key, value) in self.state.worker_envs() {
            cmd.env(key, value);
        }
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        debug!("Launching worker");
        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to spawn {kind} worker: {command}"))?;

        let code = status.code().unwrap_or(-1);
        if status.success() {
            debug!(exit_code = code, "Worker finished");
        } else {
            warn!(exit_code = code, "Worker exited with failure");
        }
        Ok(code)
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn report_heartbeat(&self, heart: HeartbeatDescriptor) -> Result<()> {
        self.state.apply_heartbeat(&heart);
        debug!(status = ?heart.agent_status, "Heartbeat acknowledged");
        Ok(())
    }

    async fn run_build(&self, build: BuildDescriptor) -> Result<()> {
        info!(project = %build.project_id, build = %build.build_id, "Starting build");
        let code = self
            .run_worker("build", self.worker.build_command.as_deref(), &build, &[])
            .await?;
        anyhow::ensure!(code == 0, "Build worker exited with code {code}");
        Ok(())
    }

    async fn run_upgrade(&self, upgrade: UpgradeDescriptor, build_in_flight: bool) -> Result<()> {
        info!(version = ?upgrade.version, build_in_flight, "Starting upgrade");
        let extra = [("FLEETD_BUILD_IN_FLIGHT", build_in_flight.to_string())];
        let replace_agent = upgrade.agent;
        let code = self
            .run_worker(
                "upgrade",
                self.worker.upgrade_command.as_deref(),
                &upgrade,
                &extra,
            )
            .await?;
        anyhow::ensure!(code == 0, "Upgrade worker exited with code {code}");

        if replace_agent {
            // The new binary is on disk; the service manager restarts us
            self.shutdown
                .request(EXIT_CODE_RESTART, "upgrade installed a new agent binary");
        }
        Ok(())
    }

    async fn run_pipeline(&self, pipeline: PipelineDescriptor) -> Result<()> {
        info!(seq = %pipeline.seq_id, project = %pipeline.project_id, "Starting pipeline");
        let code = self
            .run_worker(
                "pipeline",
                self.worker.pipeline_command.as_deref(),
                &pipeline,
                &[],
            )
            .await?;
        anyhow::ensure!(code == 0, "Pipeline worker exited with code {code}");
        Ok(())
    }

    async fn run_debug_container(&self, container: DebugDescriptor) -> Result<()> {
        info!(build = %container.build_id, image = %container.image, "Starting debug container");
        let code = self
            .run_worker(
                "debug",
                self.worker.debug_command.as_deref(),
                &container,
                &[],
            )
            .await?;
        anyhow::ensure!(code == 0, "Debug worker exited with code {code}");
        Ok(())
    }
}

#[async_trait]
impl LifecycleManager for ProcessExecutor {
    async fn uninstall(&self) -> Result<()> {
        info!("Uninstalling agent after remote decommission");
        if self.worker.uninstall_command.is_none() {
            warn!("No uninstall command configured, leaving files in place");
            return Ok(());
        }
        let code = self
            .run_worker(
                "uninstall",
                self.worker.uninstall_command.as_deref(),
                &serde_json::json!({}),
                &[],
            )
            .await?;
        anyhow::ensure!(code == 0, "Uninstall worker exited with code {code}");
        Ok(())
    }
}
