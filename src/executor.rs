//! Boundary traits for the subsystems the loop hands work to.
//!
//! The control loop only launches work; the engines behind these traits own
//! everything past the launch, including reporting results upstream.

mod process;

pub use process::ProcessExecutor;

use anyhow::Result;
use async_trait::async_trait;

use crate::protocol::{
    BuildDescriptor, DebugDescriptor, HeartbeatDescriptor, PipelineDescriptor, UpgradeDescriptor,
};

/// Entry points for the five task kinds.
///
/// Every method runs on its own spawned task and may take as long as it
/// needs without affecting the loop. Errors surface through the supervisor,
/// never back to the loop; a condition the whole agent cannot survive is
/// reported through the shutdown signal instead of the return value.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Deliver a heartbeat reply for local application.
    async fn report_heartbeat(&self, heart: HeartbeatDescriptor) -> Result<()>;

    /// Run an assigned build to completion.
    async fn run_build(&self, build: BuildDescriptor) -> Result<()>;

    /// Replace agent/worker components. `build_in_flight` tells the engine
    /// a build was launched in the same cycle so it can defer binary
    /// replacement.
    async fn run_upgrade(&self, upgrade: UpgradeDescriptor, build_in_flight: bool) -> Result<()>;

    /// Execute a pipeline command.
    async fn run_pipeline(&self, pipeline: PipelineDescriptor) -> Result<()>;

    /// Provision a debug container.
    async fn run_debug_container(&self, container: DebugDescriptor) -> Result<()>;
}

/// Local lifecycle operations outside the poll cycle.
#[async_trait]
pub trait LifecycleManager: Send + Sync {
    /// Remove this agent from the host after remote decommission. Called
    /// exactly once; the process exits right after.
    async fn uninstall(&self) -> Result<()>;
}
