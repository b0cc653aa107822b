//! Ask protocol message types.
//!
//! One poll cycle sends an `AskRequest` and receives an `AskResult`
//! envelope; its `data` payload decodes to an `AskResponse` carrying up to
//! five optional task descriptors. Field names follow the coordinator's
//! camelCase JSON schema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::status::AgentStatusCode;

/// Which build workloads the agent accepts this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildKind {
    /// Builds disabled this cycle.
    None,
    /// Host binary builds only.
    Binary,
    /// Docker builds only.
    Docker,
    /// Both binary and docker builds.
    All,
}

/// Capability flags, recomputed fresh before every poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskEnable {
    pub build: BuildKind,
    pub upgrade: bool,
    pub pipeline: bool,
    pub docker_debug: bool,
}

/// Agent health snapshot, sent upstream with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatInfo {
    pub agent_id: String,
    pub agent_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub running_builds: usize,
    pub running_pipelines: usize,
    pub running_debug_containers: usize,
}

/// Installed component versions, attached only while upgrade is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    pub agent_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_version: Option<String>,
}

/// Outbound poll payload. Built once per cycle, immutable after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub enable: AskEnable,
    pub heart: HeartbeatInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradeInfo>,
}

/// Raw response envelope from the coordinator.
///
/// `data` stays opaque until the status is confirmed ready; decode it with
/// [`AskResult::decode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResult {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    pub agent_status: AgentStatusCode,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AskResult {
    /// Decode the opaque payload into task descriptors.
    pub fn decode(&self) -> Result<AskResponse, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Decoded work assignment. Each descriptor is present only when the
/// coordinator assigned that kind of work this cycle; once dispatched, the
/// descriptor is owned by the task handling it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    #[serde(default)]
    pub heart: Option<HeartbeatDescriptor>,
    #[serde(default)]
    pub build: Option<BuildDescriptor>,
    #[serde(default)]
    pub upgrade: Option<UpgradeDescriptor>,
    #[serde(default)]
    pub pipeline: Option<PipelineDescriptor>,
    #[serde(default)]
    pub debug: Option<DebugDescriptor>,
}

/// A build assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub project_id: String,
    pub build_id: String,
    #[serde(default)]
    pub vm_seq_id: Option<String>,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
}

/// A pipeline command from the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescriptor {
    pub seq_id: String,
    pub project_id: String,
    pub body: String,
}

/// Which components the coordinator wants replaced, and the target version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeDescriptor {
    #[serde(default)]
    pub agent: bool,
    #[serde(default)]
    pub worker: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// A debug-container provisioning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugDescriptor {
    pub project_id: String,
    pub build_id: String,
    pub image: String,
    #[serde(default)]
    pub debug_url: Option<String>,
}

/// Heartbeat reply: settings the coordinator pushes down for the agent to
/// apply locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatDescriptor {
    #[serde(default)]
    pub agent_status: Option<AgentStatusCode>,
    #[serde(default)]
    pub parallel_task_count: Option<u32>,
    #[serde(default)]
    pub docker_parallel_task_count: Option<u32>,
    #[serde(default)]
    pub envs: HashMap<String, String>,
}
