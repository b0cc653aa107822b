//! Agent configuration.
//!
//! Loaded from a JSON file written at install time. The path comes from
//! `--config`, the `FLEETD_CONFIG` environment variable, or `./fleetd.json`,
//! in that order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the coordinator, e.g. `https://ci.example.com`.
    pub coordinator_url: String,

    /// Agent identity assigned at install time.
    pub agent_id: String,

    /// Shared secret authenticating this agent to the coordinator.
    pub secret_key: String,

    /// Hostname reported in heartbeats. Falls back to `$HOSTNAME` when unset.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Bound on a single coordinator round trip, in seconds.
    #[serde(default = "default_ask_timeout")]
    pub ask_timeout_secs: u64,

    /// Which task categories this agent accepts.
    #[serde(default)]
    pub capabilities: CapabilityConfig,

    /// External worker commands, one per task kind.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Installed capability switches. The loop may narrow these per cycle from
/// coordinator-pushed settings, never widen them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityConfig {
    /// Accept host binary builds.
    #[serde(default = "default_true")]
    pub enable_build: bool,

    /// Accept docker builds.
    #[serde(default)]
    pub enable_docker_build: bool,

    /// Accept self-upgrade commands.
    #[serde(default = "default_true")]
    pub enable_upgrade: bool,

    /// Accept pipeline commands.
    #[serde(default)]
    pub enable_pipeline: bool,

    /// Accept debug-container provisioning.
    #[serde(default)]
    pub enable_docker_debug: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            enable_build: true,
            enable_docker_build: false,
            enable_upgrade: true,
            enable_pipeline: false,
            enable_docker_debug: false,
        }
    }
}

/// Commands the agent launches for assigned work. A missing command makes
/// the corresponding task fail locally (logged, never fatal).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Command run for an assigned build.
    #[serde(default)]
    pub build_command: Option<String>,

    /// Command run for an assigned pipeline.
    #[serde(default)]
    pub pipeline_command: Option<String>,

    /// Command that installs a new agent/worker version.
    #[serde(default)]
    pub upgrade_command: Option<String>,

    /// Command that provisions a debug container.
    #[serde(default)]
    pub debug_command: Option<String>,

    /// Command run once when the coordinator decommissions this agent.
    #[serde(default)]
    pub uninstall_command: Option<String>,

    /// Working directory for launched workers.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Version of the installed worker, reported with upgrade info.
    #[serde(default)]
    pub worker_version: Option<String>,
}

impl Config {
    /// Load configuration, resolving the path from the argument, the
    /// `FLEETD_CONFIG` environment variable, or `./fleetd.json`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os("FLEETD_CONFIG")
                .map_or_else(|| PathBuf::from("fleetd.json"), PathBuf::from),
        };
        debug!(path = %path.display(), "Loading configuration");

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.coordinator_url.is_empty(),
            "coordinatorUrl must not be empty"
        );
        anyhow::ensure!(!self.agent_id.is_empty(), "agentId must not be empty");
        anyhow::ensure!(!self.secret_key.is_empty(), "secretKey must not be empty");
        anyhow::ensure!(
            self.poll_interval_secs >= 1,
            "pollIntervalSecs must be at least 1"
        );
        anyhow::ensure!(
            self.ask_timeout_secs >= 1,
            "askTimeoutSecs must be at least 1"
        );
        Ok(())
    }

    /// Hostname to report upstream.
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        self.hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
    }

    /// Create a config from a JSON string (for testing).
    #[cfg(test)]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse JSON")?;
        Ok(config)
    }
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_ask_timeout() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}
