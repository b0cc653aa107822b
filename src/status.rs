//! Agent lifecycle status and its classification.
//!
//! The coordinator reports one status code per poll. Only `IMPORT_OK`
//! unblocks work dispatch; only `DELETE` ends the loop. Everything else is
//! retried at the next cycle.

use serde::{Deserialize, Serialize};

/// Agent lifecycle status as reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatusCode {
    /// Registered on the host but not yet imported on the coordinator.
    UnImport,
    /// Import acknowledged, activation still pending.
    UnImportOk,
    /// Fully imported; the agent may receive work.
    ImportOk,
    /// Coordinator-side problem with this agent's registration.
    ImportException,
    /// Agent was decommissioned remotely.
    Delete,
    /// Any code this agent build does not recognize.
    #[serde(other)]
    Unknown,
}

/// What the control loop does with a reported status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// Normal operation: decode the payload and dispatch work.
    Ready,
    /// Known not-ready state; retry at the next cycle.
    Continue,
    /// Unexpected state; retry at the next cycle, logged louder.
    Error,
    /// Remote decommission: uninstall and stop for good.
    Deleted,
}

/// Classify a coordinator-reported status into a loop decision.
///
/// Flat classification, no history: `Continue` and `Error` both mean
/// log-and-retry and differ only in log severity.
#[must_use]
pub const fn classify(code: AgentStatusCode) -> StatusDecision {
    match code {
        AgentStatusCode::ImportOk => StatusDecision::Ready,
        AgentStatusCode::Delete => StatusDecision::Deleted,
        AgentStatusCode::UnImport | AgentStatusCode::UnImportOk => StatusDecision::Continue,
        AgentStatusCode::ImportException | AgentStatusCode::Unknown => StatusDecision::Error,
    }
}
