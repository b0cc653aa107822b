//! Agent-local state fed by coordinator heartbeat replies.
//!
//! The heartbeat task writes, capability computation and worker launches
//! read. Locks are held for snapshots only, never across an await.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::protocol::HeartbeatDescriptor;

/// Settings the coordinator pushes down in heartbeat replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerSettings {
    /// Maximum concurrent binary builds; zero pauses build intake.
    pub parallel_task_count: Option<u32>,
    /// Maximum concurrent docker builds; zero pauses docker intake.
    pub docker_parallel_task_count: Option<u32>,
}

/// Shared agent-local state. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    settings: Arc<RwLock<ServerSettings>>,
    envs: Arc<RwLock<HashMap<String, String>>>,
}

impl AgentState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a heartbeat reply. Only fields the coordinator actually sent
    /// overwrite local values; changes are logged.
    pub fn apply_heartbeat(&self, heart: &HeartbeatDescriptor) {
        {
            let mut settings = self.settings.write();
            if heart.parallel_task_count.is_some()
                && heart.parallel_task_count != settings.parallel_task_count
            {
                info!(
                    count = ?heart.parallel_task_count,
                    "Coordinator updated parallel task count"
                );
                settings.parallel_task_count = heart.parallel_task_count;
            }
            if heart.docker_parallel_task_count.is_some()
                && heart.docker_parallel_task_count != settings.docker_parallel_task_count
            {
                info!(
                    count = ?heart.docker_parallel_task_count,
                    "Coordinator updated docker parallel task count"
                );
                settings.docker_parallel_task_count = heart.docker_parallel_task_count;
            }
        }

        if !heart.envs.is_empty() {
            *self.envs.write() = heart.envs.clone();
        }
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn server_settings(&self) -> ServerSettings {
        *self.settings.read()
    }

    /// Environment variables the coordinator wants injected into workers.
    #[must_use]
    pub fn worker_envs(&self) -> HashMap<String, String> {
        self.envs.read().clone()
    }
}
