// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance power state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse lifecycle state of a managed instance.
///
/// The container runtime is authoritative; this value is the daemon's
/// view, persisted best-effort to the states file for crash recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    Offline,
    Starting,
    Running,
    Stopping,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Offline => "offline",
            PowerState::Starting => "starting",
            PowerState::Running => "running",
            PowerState::Stopping => "stopping",
        }
    }

    /// Whether the instance is in a state a `stop` action applies to.
    pub fn is_stoppable(&self) -> bool {
        matches!(self, PowerState::Starting | PowerState::Running)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A power action requested by the API or by internal recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Restart => "restart",
            PowerAction::Kill => "kill",
        }
    }

    /// Parse an action name as it appears on the wire.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(PowerAction::Start),
            "stop" => Some(PowerAction::Stop),
            "restart" => Some(PowerAction::Restart),
            "kill" => Some(PowerAction::Kill),
            _ => None,
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
