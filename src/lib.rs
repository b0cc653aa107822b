//! fleetd agent library
//!
//! Core of the fleet agent: the poll-decide-dispatch loop that keeps a
//! worker host in sync with its coordinator.
//! - Ask protocol types and the HTTP coordinator client
//! - Status classification driving the loop
//! - Supervised fire-and-forget dispatch of assigned work
//! - Worker-process execution of builds, pipelines, upgrades, and debug
//!   containers

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod executor;
pub mod protocol;
pub mod shutdown;
pub mod state;
pub mod status;
pub mod supervisor;

/// Agent version, reported to the coordinator with every request.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifies this agent build in HTTP user agents.
pub const BUILD_INFO: &str = concat!("fleetd/", env!("CARGO_PKG_VERSION"));
