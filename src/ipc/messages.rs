//! IPC message types for the daemon control socket

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::LogLevel;

/// Requests sent by the CLI to a running daemon
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DaemonRequest {
    /// Health check
    Ping,

    /// Rotate every configured workspace now and restart the interval
    Next,

    /// Re-read the settings file immediately
    Reload,

    GetRotateTime,

    /// Change the rotation interval (seconds, <= 0 disables); runtime
    /// only, the settings file is not rewritten
    SetRotateTime(i64),

    GetLogLevel,

    /// Change the logging threshold; runtime only
    SetLogLevel(LogLevel),

    /// Snapshot of the daemon's rotation state
    Status,
}

/// Per-workspace rotation state reported by [`DaemonResponse::Status`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceStatus {
    pub folders: usize,
    pub pool_remaining: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub rotate_time: i64,
    pub log_level: LogLevel,
    /// Keyed by workspace id; ordered so status output is stable
    pub workspaces: BTreeMap<u32, WorkspaceStatus>,
}

/// Responses sent back to the CLI
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DaemonResponse {
    Ok,
    Pong,
    RotateTime(i64),
    LogLevel(LogLevel),
    Status(DaemonStatus),
    Error(String),
}
